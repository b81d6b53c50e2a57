use speedwire2mqtt::{mqtt::{internal_commands::CommandHandler, publish_uptime, MqttManager}, SpeedwireManager};
use tokio::task::JoinHandle;
use std::{env, time::Duration};
use log::info;


#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Initialize logging
    let default_filter =  std::env::var("SW2M_LOG_LEVEL").unwrap_or("info".to_string());
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(default_filter));

    env::set_var("RUST_BACKTRACE", "1");

    // we need a channel for the subparts to send metering data to the handler
    let (mut mqtt, tx) = MqttManager::new();

    let mut threads: Vec<JoinHandle<()>> = Vec::new();

    threads.push(tokio::spawn(async move {
        mqtt.start_thread().await;
    }));

    // Start the Speedwire receiver
    let mut speedwire = SpeedwireManager::new(tx.clone());
    threads.push(tokio::spawn(async move {
        speedwire.start_thread().await;
    }));

    /* Periodic uptime publishing */
    let uptime_sender = tx.clone();
    threads.push(tokio::spawn(async move {
        // Publish immediately on startup
        publish_uptime(&uptime_sender).await;

        let mut interval = tokio::time::interval(Duration::from_secs(10));
        interval.tick().await; // Skip first immediate tick since we already published

        loop {
            interval.tick().await;
            publish_uptime(&uptime_sender).await;
        }
    }));

    /* Last but not least start our command handling */
    let command = CommandHandler::new(tx);
    threads.push(tokio::spawn(async move {
        command.start_thread().await;
    }));


    info!("All modules started, now waiting for a signal to exit");
    loop {
        tokio::time::sleep(Duration::from_secs(10)).await;
        let mut kill_all_tasks = false;
        for task in threads.iter() {
            if task.is_finished() {
                kill_all_tasks = true;
            }
        }

        if kill_all_tasks == true {
            for task in threads.iter_mut() {
                task.abort();
            }
            break;
        }
    }
    Ok(())
}
