use clap::Parser;

use lorekeeper::config::Config;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let config = Config::parse();
    lorekeeper::init_tracing(&config);

    if let Err(e) = lorekeeper::run(config).await {
        tracing::error!(error = %e, "server stopped");
        std::process::exit(1);
    }
}
