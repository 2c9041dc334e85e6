use env_logger::Env;
use starfall::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    starfall::run(AppConfig::from_env()).await
}
