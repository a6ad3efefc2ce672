use color_eyre::eyre::{
    Result,
    eyre,
};
use flip_coin::{
    client,
    wallets,
};

fn print_usage_and_exit() -> ! {
    println!(
        "Usage: tui [--devnet | --testnet | --local] [--rpc-url <url>]\n\
         [--wallet <name>] [--wallet-dir <path>]\n\
         [--indexer-url <url>]\n\
         \n\
         Flags:\n\
           --devnet            Connect to the dev network (default RPC {})\n\
           --testnet           Connect to the test network (default RPC {})\n\
           --local             Connect to a local node (default RPC {})\n\
           --rpc-url <url>     Override the RPC URL for the selected network\n\
           --wallet <name>     Keystore to sign with; omit to browse read-only\n\
           --wallet-dir <path> Override keystore directory (defaults to ~/.foundry/keystores)\n\
           --indexer-url <url> Override the GraphQL indexer endpoint from the deployment record\n\
         \n\
         Logs are written to ./logs; set RUST_LOG to change the level.",
        client::DEFAULT_DEVNET_RPC_URL,
        client::DEFAULT_TESTNET_RPC_URL,
        client::DEFAULT_LOCAL_RPC_URL,
    );
    std::process::exit(0);
}

fn parse_cli_args(args: impl IntoIterator<Item = String>) -> Result<client::AppConfig> {
    #[derive(Clone, Copy)]
    enum NetworkFlag {
        Devnet,
        Testnet,
        Local,
    }

    let mut args = args.into_iter();
    let mut network_flag: Option<NetworkFlag> = None;
    let mut custom_url: Option<String> = None;
    let mut wallet_dir: Option<String> = None;
    let mut wallet_name: Option<String> = None;
    let mut indexer_url: Option<String> = None;

    while let Some(arg) = args.next() {
        let flag = match arg.as_str() {
            "--devnet" => Some(NetworkFlag::Devnet),
            "--testnet" => Some(NetworkFlag::Testnet),
            "--local" => Some(NetworkFlag::Local),
            _ => None,
        };
        if let Some(flag) = flag {
            if network_flag.is_some() {
                return Err(eyre!(
                    "Multiple network flags provided; choose one of --devnet/--testnet/--local"
                ));
            }
            network_flag = Some(flag);
            continue;
        }
        match arg.as_str() {
            "--rpc-url" => {
                let url = args
                    .next()
                    .ok_or_else(|| eyre!("--rpc-url requires a URL argument"))?;
                if custom_url.is_some() {
                    return Err(eyre!("--rpc-url may only be specified once"));
                }
                if network_flag.is_none() {
                    return Err(eyre!(
                        "--rpc-url must follow a network flag (--devnet/--testnet/--local)"
                    ));
                }
                custom_url = Some(url);
            }
            "--wallet-dir" => {
                let dir = args
                    .next()
                    .ok_or_else(|| eyre!("--wallet-dir requires a path argument"))?;
                if wallet_dir.is_some() {
                    return Err(eyre!("--wallet-dir may only be specified once"));
                }
                wallet_dir = Some(dir);
            }
            "--wallet" => {
                let name = args
                    .next()
                    .ok_or_else(|| eyre!("--wallet requires a wallet name"))?;
                if wallet_name.is_some() {
                    return Err(eyre!("--wallet may only be specified once"));
                }
                wallet_name = Some(name);
            }
            "--indexer-url" => {
                let url = args
                    .next()
                    .ok_or_else(|| eyre!("--indexer-url requires a URL argument"))?;
                if indexer_url.is_some() {
                    return Err(eyre!("--indexer-url may only be specified once"));
                }
                indexer_url = Some(url);
            }
            "--help" | "-h" => print_usage_and_exit(),
            other => return Err(eyre!("Unknown argument: {other}")),
        }
    }

    let network = match network_flag {
        None => {
            return Err(eyre!(
                "Select a network with --devnet, --testnet, or --local"
            ));
        }
        Some(NetworkFlag::Devnet) => client::NetworkTarget::Devnet {
            url: custom_url.unwrap_or_else(|| client::DEFAULT_DEVNET_RPC_URL.to_string()),
        },
        Some(NetworkFlag::Testnet) => client::NetworkTarget::Testnet {
            url: custom_url
                .unwrap_or_else(|| client::DEFAULT_TESTNET_RPC_URL.to_string()),
        },
        Some(NetworkFlag::Local) => client::NetworkTarget::LocalNode {
            url: custom_url.unwrap_or_else(|| client::DEFAULT_LOCAL_RPC_URL.to_string()),
        },
    };

    let wallet = match wallet_name {
        Some(name) => Some(client::WalletConfig::Keystore {
            name,
            dir: wallets::resolve_keystore_dir(wallet_dir.as_deref())?,
        }),
        None if wallet_dir.is_some() => {
            return Err(eyre!("--wallet-dir has no effect without --wallet"));
        }
        None => None,
    };

    Ok(client::AppConfig {
        network,
        wallet,
        indexer_url,
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    client::init_tracing();
    tracing::info!("starting flip-coin client");
    deployments::ensure_structure().map_err(|e| eyre!("{e:#}"))?;
    let app_config = parse_cli_args(std::env::args().skip(1))?;
    client::run_app(app_config).await
}
