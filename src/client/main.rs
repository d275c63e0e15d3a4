use std::env;

use svcregistry::caller::Caller;
use svcregistry::config::Config;
use svcregistry::error::{Error, Result};
use svcregistry::rpc::registry::ServiceEndpoint;

const USAGE: &str = "usage: client list | info <service> | call <service> [args...]";

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let caller = Caller::new(Config::from_env()?);

    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["list"] => {
            let mut services: Vec<_> = caller.list_services().await?.into_iter().collect();
            if services.is_empty() {
                println!("No services registered.");
            }
            services.sort_by(|a, b| a.0.cmp(&b.0));
            for (_, endpoint) in services {
                println!("{}", describe(&endpoint));
            }
        }
        ["info", name] => {
            let endpoint = caller.get_service_info(name).await?;
            println!("{}", describe(&endpoint));
        }
        ["call", name, rest @ ..] => {
            let endpoint = caller.get_service_info(name).await?;
            let arity = endpoint.contract.as_ref().map(|c| c.arity()).unwrap_or(0);
            if rest.len() != arity {
                return Err(Error::Parse(format!(
                    "{} takes {} argument(s), got {}",
                    name,
                    arity,
                    rest.len()
                )));
            }
            let result = caller.call(name, rest.iter().copied()).await?;
            println!("{}", result);
        }
        _ => return Err(Error::Parse(USAGE.into())),
    }

    Ok(())
}

fn describe(endpoint: &ServiceEndpoint) -> String {
    let mut out = format!("Address: {}\n", endpoint.address);
    if let Some(contract) = &endpoint.contract {
        out += &format!(
            "Service: {}\nDescription: {}\nResult: {}\n",
            contract.name, contract.description, contract.result_type
        );
        for (i, arg) in contract.arguments.iter().enumerate() {
            out += &format!(
                "  {}. {} ({}): {}\n",
                i + 1,
                arg.name,
                arg.type_tag,
                arg.description
            );
        }
    }
    out
}
