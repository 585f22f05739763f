use std::sync::Arc;

use sensor_import::config::PlotConfig;
use sensor_import::{
    default_output_path, render, ChannelGroup, ColumnAssignment, Converter, Engine, ImportError,
    PlotKind, Session,
};
use tempfile::TempDir;

use crate::helpers::{indexed_table, write_csv, FakeEngine, Rendered};

/// Session holding a converted 50x6 table mapped as acc 0..3, gyro 3..6.
fn converted_session(dir: &TempDir, engine: &Arc<FakeEngine>) -> (Session, Converter) {
    let input = write_csv(dir.path(), "imu.csv", &indexed_table(50, 6));
    let shared: Arc<dyn Engine> = engine.clone();
    let converter = Converter::new(Some(shared));
    let assignment = ColumnAssignment {
        acceleration: vec![0, 1, 2],
        gyroscope: vec![3, 4, 5],
        noise: vec![],
    };
    let result = converter
        .convert(&input, &default_output_path(&input), Some(&assignment))
        .unwrap();

    let mut session = Session::new(PlotConfig::default());
    session.set_result(result);
    (session, converter)
}

#[test]
fn selection_is_clamped_to_mapped_channels() {
    let dir = TempDir::new().unwrap();
    let engine = FakeEngine::ready();
    let (mut session, _) = converted_session(&dir, &engine);

    session.select_channel(ChannelGroup::Gyroscope, 2);
    assert_eq!(session.selection.channel, 2);
    assert_eq!(session.selected_data(), Some(indexed_table(50, 6).column(4).unwrap()));

    session.select_channel(ChannelGroup::Gyroscope, 7);
    assert_eq!(session.selection.channel, 1);

    session.select_channel(ChannelGroup::Noise, 1);
    assert_eq!(session.channel_count(ChannelGroup::Noise), 0);
    assert_eq!(session.selected_data(), None);
}

#[test]
fn plot_sends_selected_column_to_engine() {
    let dir = TempDir::new().unwrap();
    let engine = FakeEngine::ready();
    let (mut session, _) = converted_session(&dir, &engine);

    session.select_channel(ChannelGroup::Acceleration, 3);
    session.set_sample_rate(250.0);
    session.plot(engine.as_ref(), PlotKind::Spectrum).unwrap();
    session.close_plots(engine.as_ref()).unwrap();

    assert_eq!(
        engine.rendered(),
        vec![
            Rendered::Spectrum {
                len: 50,
                sample_rate: 250.0,
                title: PlotConfig::default().spectrum_title,
            },
            Rendered::CloseAll,
        ]
    );
}

#[test]
fn plot_requires_running_engine_and_data() {
    let dir = TempDir::new().unwrap();
    let engine = FakeEngine::ready();
    let (mut session, _) = converted_session(&dir, &engine);

    let stopped = FakeEngine::stopped();
    let err = session.plot(stopped.as_ref(), PlotKind::TimeSeries).unwrap_err();
    assert!(matches!(err, ImportError::EngineUnavailable { .. }));

    session.select_channel(ChannelGroup::Noise, 1);
    let err = session.plot(engine.as_ref(), PlotKind::TimeSeries).unwrap_err();
    assert!(matches!(err, ImportError::NothingSelected { .. }));
    assert!(engine.rendered().is_empty());
}

#[test]
fn sample_rate_is_clamped() {
    let mut session = Session::default();
    session.set_sample_rate(0.0);
    assert_eq!(session.sample_rate, 1.0);
    session.set_sample_rate(1e6);
    assert_eq!(session.sample_rate, 10_000.0);
}

#[test]
fn save_rewrites_output_with_new_assignment() {
    let dir = TempDir::new().unwrap();
    let engine = FakeEngine::ready();
    let (mut session, converter) = converted_session(&dir, &engine);

    session
        .set_assignment(ColumnAssignment {
            acceleration: vec![0],
            noise: vec![5],
            ..Default::default()
        })
        .unwrap();
    session.save(&converter).unwrap();

    let output = session.current.as_ref().unwrap().output.clone();
    let restored = converter.read_grouped(&output).unwrap();
    assert_eq!(
        restored.groups().collect::<Vec<_>>(),
        vec![
            ChannelGroup::Acceleration,
            ChannelGroup::Noise,
            ChannelGroup::OtherData
        ]
    );
    assert_eq!(restored.get(ChannelGroup::OtherData).unwrap().shape(), (50, 4));
    assert_eq!(session.files, vec![output]);
}

#[test]
fn rejected_assignment_keeps_previous_one() {
    let dir = TempDir::new().unwrap();
    let engine = FakeEngine::ready();
    let (mut session, _) = converted_session(&dir, &engine);
    let before = session.assignment().cloned();

    let err = session
        .set_assignment(ColumnAssignment {
            noise: vec![9],
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(err, ImportError::InvalidAssignment(_)));
    assert_eq!(session.assignment().cloned(), before);
}

#[test]
fn mapping_without_a_file_is_reported() {
    let mut session = Session::default();
    session
        .set_assignment(ColumnAssignment {
            acceleration: vec![0],
            ..Default::default()
        })
        .unwrap();
    assert!(session.assignment().is_none());
    assert_eq!(session.status_message.as_deref(), Some("Nothing to map"));
}

#[test]
fn rejected_plot_is_render_failure() {
    let dir = TempDir::new().unwrap();
    let engine = FakeEngine::ready();
    let (mut session, _) = converted_session(&dir, &engine);

    engine.set_fail_renders(true);
    let err = session.plot(engine.as_ref(), PlotKind::TimeSeries).unwrap_err();
    match err {
        ImportError::RenderFailure { title, .. } => {
            assert_eq!(title, PlotConfig::default().time_title)
        }
        other => panic!("expected RenderFailure, got {other:?}"),
    }
    assert!(session
        .status_message
        .as_deref()
        .is_some_and(|m| m.starts_with("Plot failed")));
}

#[test]
fn render_checks_engine_and_maps_failures() {
    let plot = PlotConfig::default();
    let values = [0.1, 0.2, 0.3];

    let stopped = FakeEngine::stopped();
    let err = render(stopped.as_ref(), PlotKind::Spectrum, &values, 100.0, &plot).unwrap_err();
    assert!(matches!(err, ImportError::EngineUnavailable { .. }));

    let engine = FakeEngine::ready();
    render(engine.as_ref(), PlotKind::TimeSeries, &values, 100.0, &plot).unwrap();
    assert_eq!(
        engine.rendered(),
        vec![Rendered::TimeSeries {
            len: 3,
            sample_rate: 100.0,
            title: plot.time_title.clone(),
        }]
    );

    engine.set_fail_renders(true);
    let err = render(engine.as_ref(), PlotKind::Spectrum, &values, 100.0, &plot).unwrap_err();
    assert!(matches!(err, ImportError::RenderFailure { .. }));
}
