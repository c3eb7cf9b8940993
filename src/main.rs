#[tokio::main]
async fn main() -> std::process::ExitCode {
    match bloodbank_lib::run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("bloodbank: {e}");
            std::process::ExitCode::FAILURE
        }
    }
}
