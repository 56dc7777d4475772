#[tokio::main]
async fn main() {
    let code = tether_cli::run().await;
    std::process::exit(code);
}
