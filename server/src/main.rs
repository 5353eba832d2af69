fn main() -> anyhow::Result<()> {
    finwiser_lib::run()
}
