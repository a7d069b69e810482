#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sos_beacon_lib::run().await
}
