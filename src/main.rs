fn main() -> anyhow::Result<()> {
    tidings::cli::run()
}
