#[tokio::main]
async fn main() {
    if let Err(err) = hr_attendance_lib::run().await {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
