#[tokio::main]
async fn main() -> anyhow::Result<()> {
  robot_bridge_lib::run().await
}
