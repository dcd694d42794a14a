use anyhow::{Context, Result};
use gazelog_core::{CommandClient, Config};
use std::net::{IpAddr, SocketAddr};

pub async fn send_command(commands: &[String], host: &str, port: Option<u16>) -> Result<()> {
    let port = match port {
        Some(port) => port,
        None => Config::load()?.port,
    };
    let ip: IpAddr = host
        .parse()
        .with_context(|| format!("Invalid host address: {host}"))?;

    let client = CommandClient::new(SocketAddr::new(ip, port));
    let sent = client.send_commands(commands).await?;
    println!("Sent {sent} command(s) to {ip}:{port}");
    Ok(())
}
