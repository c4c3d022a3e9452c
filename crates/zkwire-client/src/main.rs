//! zkwire -- manual driver for the dispatcher.
//!
//! Usage:
//!   zkwire get /path                 # Read a node
//!   zkwire children /path --watch    # List children, wait for one event
//!   zkwire create /path data         # Create a node
//!   zkwire --server host:2181 stat /path

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use zkwire_client::{ClientConfig, Dispatcher, Managers, Packet};
use zkwire_proto::{
    create_flags, open_acl_unsafe, ConnectRequest, CreateRequest, DeleteRequest, OpCode,
    PathWatchRequest, Request, RequestHeader, ResponseBody, PING_XID,
};

#[derive(Parser)]
#[command(name = "zkwire", about = "ZooKeeper wire-protocol driver")]
struct Cli {
    /// Server address (overrides the first configured server)
    #[arg(short, long)]
    server: Option<String>,

    /// Path to config file
    #[arg(short, long, default_value = "~/.zkwire/config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a node's data
    Get { path: String },
    /// List a node's children
    Children {
        path: String,
        /// Register a child watch and wait for one event
        #[arg(long)]
        watch: bool,
    },
    /// Create a node
    Create {
        path: String,
        #[arg(default_value = "")]
        data: String,
        #[arg(long)]
        ephemeral: bool,
        #[arg(long)]
        sequential: bool,
    },
    /// Delete a node
    Delete {
        path: String,
        #[arg(long, default_value_t = -1)]
        version: i32,
    },
    /// Show a node's stat
    Stat { path: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zkwire=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg = ClientConfig::load_or_default(&expand_tilde(&cli.config))?;
    let server = cli
        .server
        .or_else(|| cfg.servers.first().cloned())
        .ok_or_else(|| anyhow::anyhow!("no server configured"))?;

    let stream = tokio::time::timeout(
        cfg.connect_timeout(),
        tokio::net::TcpStream::connect(&server),
    )
    .await
    .map_err(|_| anyhow::anyhow!("connect to {server} timed out"))??;
    stream.set_nodelay(true)?;
    tracing::info!(%server, "connected");

    let dispatcher = Dispatcher::new(stream);
    let managers = Managers::new();
    dispatcher
        .submit(Packet::ConfigureManagers(managers.clone()))
        .await?;

    // Establish the session before anything else hits the queue.
    let rx = dispatcher
        .submit(Packet::Connect(ConnectRequest::new(
            cfg.session_timeout_ms,
            cfg.read_only,
        )))
        .await?;
    let reply = rx.await??;
    let ResponseBody::Connect(session) = reply.body else {
        anyhow::bail!("connect reply carried no session");
    };
    dispatcher.submit(Packet::ConfigureDone).await?;
    tracing::info!(
        session_id = format_args!("{:#x}", session.session_id),
        timeout_ms = session.timeout_ms,
        "session ready"
    );

    // Heartbeats keep the session alive while we wait on watches.
    {
        let dispatcher = dispatcher.clone();
        managers.session.ping.schedule(cfg.ping_interval(), move || {
            let dispatcher = dispatcher.clone();
            async move {
                let packet = Packet::Protocol {
                    header: RequestHeader::new(PING_XID, OpCode::Ping),
                    request: Request::Ping,
                };
                match dispatcher.submit(packet).await {
                    Ok(rx) => {
                        let _ = rx.await;
                    }
                    Err(e) => tracing::debug!("heartbeat not submitted: {e}"),
                }
            }
        });
    }

    match cli.command {
        Commands::Get { path } => {
            let reply = call(
                &dispatcher,
                Request::GetData(PathWatchRequest { path, watch: false }),
            )
            .await?;
            match reply.body {
                ResponseBody::GetData(resp) => {
                    println!("{}", String::from_utf8_lossy(&resp.data));
                    tracing::info!(version = resp.stat.version, len = resp.stat.data_length, "ok");
                }
                _ => print_error(&reply),
            }
        }
        Commands::Children { path, watch } => {
            let watch_rx = if watch {
                Some(managers.watches.register(&path, zkwire_client::WatchKind::Child))
            } else {
                None
            };
            let reply = call(
                &dispatcher,
                Request::GetChildren2(PathWatchRequest { path, watch }),
            )
            .await?;
            match reply.body {
                ResponseBody::GetChildren2(resp) => {
                    for child in &resp.children {
                        println!("{child}");
                    }
                    if let Some(mut rx) = watch_rx {
                        tracing::info!("waiting for a child event (ctrl-c to stop)");
                        tokio::select! {
                            event = rx.recv() => {
                                if let Some(event) = event {
                                    println!("event: {:?} {}", event.event_type, event.path);
                                }
                            }
                            _ = tokio::signal::ctrl_c() => {}
                        }
                    }
                }
                _ => print_error(&reply),
            }
        }
        Commands::Create {
            path,
            data,
            ephemeral,
            sequential,
        } => {
            let mut flags = create_flags::PERSISTENT;
            if ephemeral {
                flags |= create_flags::EPHEMERAL;
            }
            if sequential {
                flags |= create_flags::SEQUENTIAL;
            }
            let reply = call(
                &dispatcher,
                Request::Create(CreateRequest {
                    path,
                    data: data.into_bytes(),
                    acl: open_acl_unsafe(),
                    flags,
                }),
            )
            .await?;
            match reply.body {
                ResponseBody::Create(resp) => println!("{}", resp.path),
                _ => print_error(&reply),
            }
        }
        Commands::Delete { path, version } => {
            let reply = call(&dispatcher, Request::Delete(DeleteRequest { path, version })).await?;
            match reply.error() {
                None => println!("deleted"),
                Some(_) => print_error(&reply),
            }
        }
        Commands::Stat { path } => {
            let reply = call(
                &dispatcher,
                Request::Exists(PathWatchRequest { path, watch: false }),
            )
            .await?;
            match reply.body {
                ResponseBody::Exists(resp) => {
                    let stat = resp.stat;
                    println!("czxid = {:#x}", stat.czxid);
                    println!("mzxid = {:#x}", stat.mzxid);
                    println!("version = {}", stat.version);
                    println!("cversion = {}", stat.cversion);
                    println!("data_length = {}", stat.data_length);
                    println!("num_children = {}", stat.num_children);
                    println!("ephemeral_owner = {:#x}", stat.ephemeral_owner);
                }
                _ => print_error(&reply),
            }
        }
    }

    // Clean shutdown: close the session, then let the read loop drain.
    let close = Packet::Protocol {
        header: RequestHeader::new(dispatcher.next_xid(), OpCode::CloseSession),
        request: Request::CloseSession,
    };
    if let Ok(rx) = dispatcher.submit(close).await {
        let _ = tokio::time::timeout(std::time::Duration::from_secs(1), rx).await;
    }
    managers.session.begin_close();
    managers.session.ping.cancel();
    Ok(())
}

/// Submit one protocol request and wait for its reply.
async fn call(
    dispatcher: &Dispatcher,
    request: Request,
) -> anyhow::Result<zkwire_client::Reply> {
    let header = RequestHeader::new(dispatcher.next_xid(), request.opcode());
    let rx = dispatcher.submit(Packet::Protocol { header, request }).await?;
    Ok(rx.await??)
}

fn print_error(reply: &zkwire_client::Reply) {
    match reply.error() {
        Some(err) => eprintln!("server error: {err}"),
        None => eprintln!("unexpected reply shape"),
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
