//! DNS Lookup Example
//!
//! Resolves a host name through the caching DNS client over a host UDP
//! socket. Queries are sent from port 53, so this usually needs elevated
//! privileges.
//!
//! Usage: dns_lookup <SERVER> <NAME>...

use std::{
    env,
    net::Ipv4Addr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use picostack_rs::{
    dns::{DnsClient, DnsConfig},
    transport::{FrameReader, UdpTransport},
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <SERVER> <NAME>...", args[0]);
        std::process::exit(1);
    }
    let server: Ipv4Addr = args[1].parse()?;
    let names = &args[2..];

    println!("DNS Lookup Example");
    println!("==================\n");

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let mac = [0x02, 0x00, 0x00, 0x00, 0x00, 0x01];
    let mut transport = UdpTransport::new(Ipv4Addr::UNSPECIFIED, mac);
    let config = DnsConfig {
        server,
        ..Default::default()
    };
    let port = config.port;
    let mut client: DnsClient = DnsClient::new(config, mac);

    let start = Instant::now();
    let mut buf = [0u8; 512];
    let mut resolved = vec![None; names.len()];

    while running.load(Ordering::SeqCst) && resolved.iter().any(Option::is_none) {
        let now = start.elapsed().as_secs();

        for (name, slot) in names.iter().zip(resolved.iter_mut()) {
            if slot.is_none() {
                *slot = client.lookup(&mut transport, name, now);
            }
        }

        while let Some((len, peer)) = transport.recv_from(port, &mut buf)? {
            let mut reader = FrameReader::new(&buf[..len]);
            if let Err(e) = client.handle_response(&mut reader, now) {
                println!("Bad response from {}: {}", peer, e);
            }
        }

        if client.sweep(now) > 0 {
            println!("Query timed out, retrying");
        }
        if now > 30 {
            println!("Giving up");
            break;
        }
        thread::sleep(Duration::from_millis(100));
    }

    for (name, address) in names.iter().zip(resolved.iter()) {
        match address {
            Some(address) => println!("{:<30} {}", name, address),
            None => println!("{:<30} (unresolved)", name),
        }
    }
    Ok(())
}
