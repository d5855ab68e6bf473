use kustoship_cli::exec;
use kustoship_common::{error, error::ShipError};

#[tokio::main]
async fn main() {
    match exec().await {
        Ok(_) => (),
        Err(e) => {
            error!("Error: {}", e);
            std::process::exit(ShipError::from(e).exit_code());
        }
    }
}
