use std::env;

use log::{info, warn};
use rand::Rng;
use svcregistry::{
    caller::Caller,
    config::Config,
    error::{Error, Result},
    rpc::service::{CallEnvelope, ServiceContract},
    service::serve,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let name = args.get(1).ok_or(Error::Parse(
        "missing service argument (double, random, isprime or concatenate)".into(),
    ))?;

    env_logger::init();

    let config = Config::from_env()?;
    info!("Starting {} service", name);

    match &name[..] {
        "double" => {
            let contract = ServiceContract::new("double", "int", "Doubles x.")
                .with_argument("x", "int", "number to double");
            serve(&config, contract, |call: CallEnvelope| async move { double(&call) }).await
        }
        "random" => {
            let contract = ServiceContract::new("random", "int", "Generates a random int")
                .with_void_argument();
            serve(&config, contract, |_call: CallEnvelope| async move {
                rand::thread_rng().gen_range(0..1000).to_string()
            })
            .await
        }
        "isprime" => {
            let contract = ServiceContract::new(
                "isprime",
                "bool",
                "Performs a deterministic Miller-Rabin test to check whether x is prime.",
            )
            .with_argument("x", "int", "number to test");
            serve(&config, contract, |call: CallEnvelope| async move { isprime(&call) }).await
        }
        "concatenate" => {
            let contract = ServiceContract::new(
                "concatenate",
                "variable",
                "Registers service1(service2()) as a new service.",
            )
            .with_argument("service1", "string", "first service name")
            .with_argument("service2", "string", "second service name")
            .with_argument("service", "string", "new service name");
            let handler_config = config.clone();
            serve(&config, contract, move |call: CallEnvelope| {
                let config = handler_config.clone();
                async move { concatenate(config, call) }
            })
            .await
        }
        other => Err(Error::Parse(format!("unknown service {:?}", other))),
    }
}

fn double(call: &CallEnvelope) -> String {
    match call.argument(0).map(|x| x.trim().parse::<i64>()) {
        Some(Ok(x)) => x.saturating_mul(2).to_string(),
        _ => format!("double: invalid argument {:?}", call.argument(0)),
    }
}

fn isprime(call: &CallEnvelope) -> String {
    match call.argument(0).map(|x| x.trim().parse::<u64>()) {
        Some(Ok(x)) => format!("isprime({}) = {}", x, is_prime(x)),
        _ => format!("isprime: invalid argument {:?}", call.argument(0)),
    }
}

/// Starts the composite service on a detached task and answers right away;
/// "1" only means the composition was accepted.
fn concatenate(config: Config, call: CallEnvelope) -> String {
    let (outer, inner, composite) = match call.arguments.as_slice() {
        [outer, inner, composite] => (outer.clone(), inner.clone(), composite.clone()),
        _ => return "0".to_owned(),
    };

    let contract = ServiceContract::new(
        composite.clone(),
        "variable",
        format!("{}({}()).", outer, inner),
    )
    .with_void_argument();

    tokio::spawn(async move {
        let caller = Caller::new(config.clone());
        let handler = move |_call: CallEnvelope| {
            let caller = caller.clone();
            let outer = outer.clone();
            let inner = inner.clone();
            async move {
                let chained = async {
                    let intermediate = caller.call(&inner, Vec::<String>::new()).await?;
                    caller.call(&outer, [intermediate]).await
                };
                chained.await.unwrap_or_else(|err: Error| format!("error: {}", err))
            }
        };
        if let Err(err) = serve(&config, contract, handler).await {
            warn!("Composite service {} stopped: {}", composite, err);
        }
    });

    "1".to_owned()
}

fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];
    for p in WITNESSES {
        if n % p == 0 {
            return n == p;
        }
    }

    let mut d = n - 1;
    let mut s = 0;
    while d % 2 == 0 {
        d /= 2;
        s += 1;
    }

    'witness: for a in WITNESSES {
        let mut x = pow_mod(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..s {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
    ((a as u128 * b as u128) % m as u128) as u64
}

fn pow_mod(mut base: u64, mut exp: u64, m: u64) -> u64 {
    let mut result = 1;
    base %= m;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mul_mod(result, base, m);
        }
        base = mul_mod(base, base, m);
        exp >>= 1;
    }
    result
}

#[test]
fn test_is_prime() {
    let primes: Vec<u64> = (0..50).filter(|n| is_prime(*n)).collect();
    assert_eq!(
        primes,
        vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47]
    );
    assert!(is_prime(1_000_000_007));
    assert!(!is_prime(3_215_031_751));
}

#[test]
fn test_double() {
    assert_eq!(double(&CallEnvelope::new("double", ["21"])), "42");
    assert!(double(&CallEnvelope::new("double", ["x"])).starts_with("double: invalid"));
}
