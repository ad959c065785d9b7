#[tokio::main]
async fn main() {
    if let Err(e) = warroom_lib::run().await {
        tracing::error!("war room failed: {e}");
        eprintln!("warroom: {e}");
        std::process::exit(1);
    }
}
