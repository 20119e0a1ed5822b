#[tokio::main]
async fn main() {
  if let Err(e) = nutriscan_engine_lib::run().await {
    eprintln!("nutriscan-engine: {}", e);
    std::process::exit(1);
  }
}
