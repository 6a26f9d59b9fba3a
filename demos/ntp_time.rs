//! NTP Time Example
//!
//! Asks a time server for the current time and prints it next to the host
//! clock.
//!
//! Usage: ntp_time <SERVER>

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

use chrono::Utc;
use picostack_rs::{
    ntp::{NtpClient, NtpConfig},
    transport::{FrameReader, UdpTransport},
};

const TIMEOUT: Duration = Duration::from_secs(5);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let server: Ipv4Addr = match env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => {
            eprintln!("Usage: ntp_time <SERVER>");
            std::process::exit(1);
        }
    };

    println!("NTP Time Example");
    println!("================\n");

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let mut transport = UdpTransport::new(Ipv4Addr::UNSPECIFIED, [0x02, 0, 0, 0, 0, 1]);
    let config = NtpConfig {
        server,
        ..Default::default()
    };
    let port = config.port;
    let mut client = NtpClient::new(config);

    client.request(&mut transport, Utc::now())?;
    println!("Request sent to {}", server);

    let start = Instant::now();
    let mut buf = [0u8; 128];
    while running.load(Ordering::SeqCst) && start.elapsed() < TIMEOUT {
        if let Some((len, peer)) = transport.recv_from(port, &mut buf)? {
            let mut reader = FrameReader::new(&buf[..len]);
            let time = client.handle_response(&mut reader)?;
            let local = Utc::now();
            println!("Server {}: {}", peer, time);
            println!("Local clock: {}", local);
            println!("Offset: {}s", (time - local).num_seconds());
            return Ok(());
        }
        thread::sleep(Duration::from_millis(50));
    }

    println!("No response from {}", server);
    Ok(())
}
