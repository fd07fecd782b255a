//! Receive-then-replay firmware: buffers a line-feed-terminated byte
//! stream arriving over UART0, then transmits it back over the same link.

#[cfg(target_os = "espidf")]
fn main() -> Result<(), uart_replay::uart_replay_error::UartReplayError> {
    use std::{sync::Arc, thread};

    use uart_replay::{
        serial::UART,
        session::{receive_loop, send_loop, SessionContext, STORAGE_CAPACITY},
    };

    const UART_NUMBER: usize = 0;
    const TXD_PIN: i32 = 1;
    const RXD_PIN: i32 = 3;
    const TASK_STACK_SIZE: usize = 4096;

    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    log::info!("Initializing UART with TX pin: {}, RX pin: {}", TXD_PIN, RXD_PIN);
    let (rx, tx) = UART::new(UART_NUMBER, TXD_PIN, RXD_PIN)?.into_split();

    log::info!("Using RAM-based storage, capacity: {} bytes", STORAGE_CAPACITY);
    let ctx = Arc::new(SessionContext::new(STORAGE_CAPACITY));

    let receiver = {
        let ctx = ctx.clone();
        thread::Builder::new()
            .name("uart_rx".into())
            .stack_size(TASK_STACK_SIZE)
            .spawn(move || {
                let mut rx = rx;
                receive_loop(&ctx, &mut rx);
            })
            .expect("failed to spawn the receive task")
    };
    let sender = {
        let ctx = ctx.clone();
        thread::Builder::new()
            .name("uart_tx".into())
            .stack_size(TASK_STACK_SIZE)
            .spawn(move || {
                let mut tx = tx;
                send_loop(&ctx, &mut tx);
            })
            .expect("failed to spawn the send task")
    };

    let _ = receiver.join();
    let _ = sender.join();
    log::info!("Session finished, device idle");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    eprintln!("uart-replay is ESP32 firmware; build it for an espidf target to run it");
}
