fn main() -> anyhow::Result<()> {
    traffic_ledger::run()
}
