#[tokio::main]
async fn main() {
    if let Err(err) = bexio_mcp::mcp::server::run_stdio().await {
        eprintln!("bexio-mcp: {}", err);
        std::process::exit(1);
    }
}
