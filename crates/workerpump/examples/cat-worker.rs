//! Uses `cat` as a stand-in worker: every queued command comes straight back
//! as a frame, so `200 ...` lines reach the 200 handler and everything else
//! lands in the default handler as an unknown frame.

#[cfg(unix)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use workerpump::dispatch::Dispatcher;

    let mut dispatcher = Dispatcher::new("/bin/cat")?;

    dispatcher.register(200, |d: &mut Dispatcher| {
        let payload = d.current_event_payload().unwrap_or_default().to_string();
        println!("200 handler: {payload}");
        if payload == "ready" {
            d.queue_command("200", ["logged", "in"]);
        }
    });
    dispatcher.register_default(|d: &mut Dispatcher| {
        if let Some(event) = d.current_event() {
            println!("default handler: {event}");
        }
    });

    dispatcher.queue_command("login", ["alice", "secret"]);
    dispatcher.queue("200 ready");

    while dispatcher.events_dispatched() < 3 {
        if !dispatcher.pump_once()? {
            break;
        }
        dispatcher.wait_ready(std::time::Duration::from_millis(50))?;
    }

    let status = dispatcher.shutdown()?;
    println!("worker exited: {status}");
    Ok(())
}

#[cfg(not(unix))]
fn main() {
    eprintln!("cat-worker requires a Unix platform");
}
