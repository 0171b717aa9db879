use anyhow::Result;
use boiler_controller_lib::config::config_path;

#[tokio::main]
async fn main() -> Result<()> {
    let path = config_path(std::env::args().nth(1));
    boiler_controller_lib::run(path).await
}
