use std::f64::consts::PI;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

const SAMPLE_RATE_HZ: f64 = 1000.0;
const ROWS: usize = 100;
const COLUMNS: [&str; 7] = [
    "acc_x", "acc_y", "acc_z", "gyro_x", "gyro_y", "gyro_z", "noise",
];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
        mean + std_dev * z
    }
}

/// Vibration tones per axis: (frequency Hz, amplitude, offset).
const ACC_TONES: [(f64, f64, f64); 3] = [(50.0, 0.8, 0.0), (120.0, 0.5, 0.0), (30.0, 0.3, 9.81)];
const GYRO_TONES: [(f64, f64, f64); 3] = [(5.0, 0.2, 0.0), (8.0, 0.15, 0.0), (2.0, 0.1, 0.0)];

fn generate(rng: &mut SimpleRng) -> Vec<[f64; 7]> {
    (0..ROWS)
        .map(|i| {
            let t = i as f64 / SAMPLE_RATE_HZ;
            let mut row = [0.0; 7];
            for (k, &(freq, amp, offset)) in ACC_TONES.iter().chain(GYRO_TONES.iter()).enumerate() {
                row[k] = offset + amp * (2.0 * PI * freq * t).sin() + rng.gauss(0.0, 0.02);
            }
            row[6] = rng.gauss(0.0, 0.05);
            row
        })
        .collect()
}

fn write_csv(path: &str, rows: &[[f64; 7]]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;
    writer.write_record(COLUMNS)?;
    for row in rows {
        writer.write_record(row.iter().map(|v| format!("{v:.6}")))?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parquet(path: &str, rows: &[[f64; 7]]) -> Result<()> {
    let schema = Arc::new(Schema::new(
        COLUMNS
            .iter()
            .map(|name| Field::new(*name, DataType::Float64, false))
            .collect::<Vec<_>>(),
    ));
    let columns: Vec<ArrayRef> = (0..COLUMNS.len())
        .map(|c| Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r[c]))) as ArrayRef)
        .collect();
    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;

    let file = std::fs::File::create(path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);
    let rows = generate(&mut rng);

    write_csv("sample_sensor.csv", &rows)?;
    write_parquet("sample_sensor.parquet", &rows)?;

    println!(
        "Wrote {} samples x {} channels at {SAMPLE_RATE_HZ} Hz to sample_sensor.csv and sample_sensor.parquet",
        rows.len(),
        COLUMNS.len()
    );
    println!("Suggested mapping: --acceleration 0,1,2 --gyroscope 3,4,5 --noise 6");
    Ok(())
}
