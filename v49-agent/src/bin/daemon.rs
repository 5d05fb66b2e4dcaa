// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
Example VITA-49 control-plane daemon. Listens on a Unix-domain socket,
accepts control-client connections, and drives a single-threaded
southbound dispatch loop against an in-memory resource table. The
`daemon.conf`/`resource.conf` section loader is out of scope, so the
resource table here is a small built-in demo set; a real deployment
would build its `ResourceTable` from a parsed config file using the
same `ResourceTableBuilder` API.
*/

use std::os::unix::net::UnixListener;
use std::time::Duration;

use clap::Parser;
use env_logger::Env;
use log::{error, info, warn};
use uuid::Uuid;
use v49_agent::{Channel, DaemonConfig, DaemonContext, NullIoctlTarget, ResourceTable, ResourceTableBuilder, UnixChannel};
use vita49::{AccessBits, ResourceDescriptor};

#[derive(Parser, Debug)]
struct Args {
    /// Unix-domain socket path to bind and listen on. Defaults to
    /// `V49_AGENT_SOCK`.
    #[arg(short, long)]
    socket: Option<String>,
    /// Poll interval between dispatch passes, in milliseconds.
    #[arg(long, default_value_t = 50)]
    poll_ms: u64,
}

fn demo_resource_table() -> ResourceTable {
    let radio0 = ResourceDescriptor::new(
        Uuid::new_v4(),
        "radio0",
        1,
        1,
        61.44,
        64,
        4096,
        AccessBits::TX | AccessBits::RX,
        None,
    )
    .expect("demo resource descriptor is well-formed");
    ResourceTableBuilder::new().insert(radio0).build()
}

/// An accepted connection, not yet attributed to a Client ID. Unlike
/// `DaemonContext`'s CID-keyed control-client set (used for northbound
/// delivery to an already-identified client), a reply to a synchronous
/// Command request always goes straight back down the connection it
/// arrived on, so this loop tracks connections separately and never
/// needs to resolve a CID before replying.
struct Connection {
    channel: UnixChannel,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match args.socket {
        Some(path) => DaemonConfig::new(path),
        None => DaemonConfig::from_env()?,
    };
    info!("binding control socket at {}", config.bind_path.display());

    let _ = std::fs::remove_file(&config.bind_path);
    let listener = UnixListener::bind(&config.bind_path)?;
    listener.set_nonblocking(true)?;

    let mut ctx = DaemonContext::new(demo_resource_table());
    let mut ioctl_target = NullIoctlTarget;
    let mut connections: Vec<Connection> = Vec::new();
    let poll_interval = Duration::from_millis(args.poll_ms);

    info!("daemon running, {} resources known", ctx.manager.resources().len());
    loop {
        match listener.accept() {
            Ok((stream, _addr)) => match UnixChannel::new(stream) {
                Ok(channel) => {
                    info!("accepted control client");
                    connections.push(Connection { channel });
                }
                Err(e) => warn!("failed to wrap accepted connection: {e}"),
            },
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(e) => error!("accept failed: {e}"),
        }

        poll_connections(&mut ctx, &mut ioctl_target, &mut connections);
        std::thread::sleep(poll_interval);
    }
}

fn poll_connections(ctx: &mut DaemonContext, ioctl_target: &mut dyn v49_agent::IoctlTarget, connections: &mut Vec<Connection>) {
    connections.retain_mut(|conn| {
        if let Err(e) = conn.channel.flush_writes() {
            warn!("flush_writes failed, dropping connection: {e}");
            return false;
        }
        loop {
            match conn.channel.try_read() {
                Ok(Some(frame)) => match v49_agent::dispatch::southbound(ctx, ioctl_target, &frame) {
                    Ok(Some(reply)) => {
                        if let Err(e) = conn.channel.enqueue(reply) {
                            warn!("reply enqueue failed: {e}");
                            return false;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => error!("southbound dispatch error: {e}"),
                },
                Ok(None) => break,
                Err(e) => {
                    warn!("channel read failed, dropping connection: {e}");
                    return false;
                }
            }
        }
        true
    });
}
