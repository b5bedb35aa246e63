// Rust Client Example: BLZ lookup
// Loads the public BLZService WSDL and looks up German bank codes
// - Listing functions and types
// - Typed wrapper generated with soap_interface!
// - Fault handling

use anyhow::Result;
use soapwire_client::logging::init_logging;
use soapwire_client::{soap_args, soap_interface, Factory, SoapError};
use tracing::{info, warn};

const WSDL: &str = "http://www.thomas-bayer.com/axis2/services/BLZService?wsdl";

soap_interface! {
    struct BlzService {
        fn get_bank => "getBank";
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging("soapwire=debug,info")?;

    let factory = Factory::with_default_transport()?;
    let client = factory.create_client(WSDL).await?;

    for function in client.functions() {
        info!("function: {}", function);
    }
    for ty in client.types() {
        info!("type: {}", ty);
    }

    let service = BlzService::new(client);
    for blz in std::env::args().skip(1) {
        match service.get_bank(soap_args![{ "blz": blz }]).await {
            Ok(bank) => info!("{}: {}", blz, serde_json::to_string_pretty(&bank)?),
            Err(SoapError::RemoteFault(fault)) => warn!("{}: {}", blz, fault.message),
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
