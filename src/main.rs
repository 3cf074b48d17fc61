fn main() -> anyhow::Result<()> {
    rangepick::cli::run()
}
