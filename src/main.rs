fn main() -> anyhow::Result<()> {
    sensor_import::cli::run()
}
