//! LLDP Agent Example
//!
//! Runs the LLDP agent over an in-memory transport and loops every
//! announcement back into the receive side, printing each LLDPDU and the
//! neighbour it produces.
//!
//! Usage: lldp_agent [MAC]

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
    lldp::{AdminStatus, LldpAgent, LldpConfig, SystemCapabilities},
    transport::{FrameReader, MemoryTransport},
    util::{format_mac, parse_mac, tlv_dump},
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mac = match env::args().nth(1) {
        Some(arg) => parse_mac(&arg).ok_or_else(|| format!("invalid MAC address: {}", arg))?,
        None => [0x02, 0x00, 0x00, 0x00, 0x00, 0x01],
    };

    println!("LLDP Agent Example");
    println!("==================\n");
    println!("Local MAC: {}", format_mac(&mac));

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let mut transport = MemoryTransport::new(mac, Ipv4Addr::new(192, 168, 1, 20));
    let mut agent = LldpAgent::new(LldpConfig {
        admin_status: AdminStatus::RxTx,
        msg_tx_interval: 5,
        system_capabilities: SystemCapabilities::STATION_ONLY,
        enabled_capabilities: SystemCapabilities::STATION_ONLY,
        ..Default::default()
    });
    agent.set_desired_power(0x100);

    println!("Press Ctrl+C to stop\n");

    let mut last_tick = Instant::now();
    while running.load(Ordering::SeqCst) {
        if last_tick.elapsed() >= Duration::from_secs(1) {
            last_tick = Instant::now();
            agent.tick();
        }
        agent.run(&mut transport);

        for frame in transport.take_sent() {
            println!("Sent {} bytes to {:?}", frame.payload.len(), frame.endpoint);
            print!("{}", tlv_dump(&frame.payload, "  "));

            let mut reader = FrameReader::new(&frame.payload);
            match agent.process_frame(&mut reader) {
                Ok(()) => {
                    if let Some(remote) = agent.remote() {
                        println!(
                            "  neighbour {} ttl {}s",
                            hex::encode(&remote.chassis_id),
                            remote.ttl
                        );
                    }
                }
                Err(e) => println!("  looped frame rejected: {}", e),
            }
            println!();
        }

        thread::sleep(Duration::from_millis(100));
    }

    println!("Stopping; power allocated {}", agent.allocated_power());
    Ok(())
}
