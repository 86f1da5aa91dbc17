use azurerm::AzureRmProvider;
use std::path::PathBuf;
use tfplug::ServerConfig;

#[tokio::main]
async fn main() -> tfplug::Result<()> {
    // Certificates ship in a certs/ directory next to the binary
    let exe_dir = std::env::current_exe()?
        .parent()
        .map(PathBuf::from)
        .unwrap_or_default();

    let config = ServerConfig::from_env()
        .with_cert_dir(&exe_dir.join("certs"))
        .with_legacy_type_system(true);

    tfplug::serve(AzureRmProvider::new(), config).await
}
