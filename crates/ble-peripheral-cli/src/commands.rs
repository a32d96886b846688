//! Command handlers for blepctl

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use ble_peripheral::adapter::{event_channel, SimulatedAdapter};
use ble_peripheral::{
    encode_ibeacon, AdapterBindings, AdvertisingRequest, Completion, PeripheralController,
    PeripheralEvent, PowerState,
};

use crate::cli::{Cli, Commands};
use crate::config::CliAppConfig;
use crate::error::{CliError, Result};

type Controller = PeripheralController<Box<dyn AdapterBindings>>;

// ----------------------------------------------------------------------------
// Session
// ----------------------------------------------------------------------------

/// A running controller with its event loop on a background task
struct Session {
    controller: Arc<Controller>,
    runner: JoinHandle<()>,
    timeout_ms: u64,
}

impl Session {
    /// Build the adapter, start the event loop and initialize the adapter.
    ///
    /// Returns once the adapter has reported its first power state.
    async fn start(config: CliAppConfig, timeout_ms: u64) -> Result<Self> {
        let (events_tx, events_rx) = event_channel();
        let adapter: Box<dyn AdapterBindings> =
            Box::new(SimulatedAdapter::new(config.simulator, events_tx));
        let controller = Arc::new(PeripheralController::new(adapter, config.peripheral));
        let mut events = controller.subscribe();

        let runner = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.run(events_rx).await })
        };
        let session = Self {
            controller,
            runner,
            timeout_ms,
        };

        session.controller.init()?;
        let state = session.first_state_change(&mut events).await?;
        if !state.is_powered_on() {
            warn!("Adapter reported {}, advertising will be refused", state);
        }
        Ok(session)
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn timed_out(&self, waiting_for: impl Into<String>) -> CliError {
        CliError::Timeout {
            waiting_for: waiting_for.into(),
            timeout_ms: self.timeout_ms,
        }
    }

    async fn first_state_change(
        &self,
        events: &mut broadcast::Receiver<PeripheralEvent>,
    ) -> Result<PowerState> {
        let wait = async {
            loop {
                match events.recv().await {
                    Ok(PeripheralEvent::StateChange(state)) => return Some(state),
                    Ok(other) => {
                        debug!("Skipping {} while waiting for adapter state", other.kind())
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Skipped {} events while waiting for adapter state", skipped)
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        };
        match tokio::time::timeout(self.timeout(), wait).await {
            Ok(Some(state)) => Ok(state),
            _ => Err(self.timed_out("adapter state")),
        }
    }

    async fn wait<T>(&self, completion: Completion<T>) -> Result<T> {
        let event = completion.event();
        let outcome = tokio::time::timeout(self.timeout(), completion)
            .await
            .map_err(|_| self.timed_out(event.as_str()))?;
        Ok(outcome?)
    }

    /// Wait for advertising to start, report it, then stop again
    async fn advertise(&self, completion: Completion<()>) -> Result<()> {
        self.wait(completion).await?;
        println!("advertising started as {}", self.controller.address());

        self.wait(self.controller.stop_advertising()?).await?;
        println!("advertising stopped");
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.runner.abort();
    }
}

// ----------------------------------------------------------------------------
// Dispatcher
// ----------------------------------------------------------------------------

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(cli: Cli, config: CliAppConfig) -> Result<()> {
        let timeout_ms = cli.timeout_ms;
        match cli.command {
            Commands::EncodeIbeacon {
                uuid,
                major,
                minor,
                measured_power,
            } => Self::handle_encode_ibeacon(&uuid, major, minor, measured_power),
            Commands::Advertise {
                name,
                service_uuids,
            } => {
                let request = service_uuids
                    .into_iter()
                    .fold(AdvertisingRequest::new(name), |request, uuid| {
                        request.with_service_uuid(uuid)
                    });
                Self::with_session(config, timeout_ms, |session| async move {
                    let completion = session.controller.advertise(&request)?;
                    session.advertise(completion).await
                })
                .await
            }
            Commands::Ibeacon {
                uuid,
                major,
                minor,
                measured_power,
            } => {
                Self::with_session(config, timeout_ms, |session| async move {
                    let completion = session
                        .controller
                        .start_advertising_ibeacon(&uuid, major, minor, measured_power)?;
                    session.advertise(completion).await
                })
                .await
            }
            Commands::Eir {
                adv_data,
                scan_data,
            } => {
                let adv_data = hex::decode(adv_data)?;
                let scan_data = scan_data.map(hex::decode).transpose()?;
                Self::with_session(config, timeout_ms, |session| async move {
                    let completion = session
                        .controller
                        .start_advertising_with_eir_data(&adv_data, scan_data.as_deref())?;
                    session.advertise(completion).await
                })
                .await
            }
            Commands::Status => {
                Self::with_session(config, timeout_ms, |session| async move {
                    Self::handle_status(&session).await
                })
                .await
            }
        }
    }

    /// Run `handler` against a fresh session and tear the session down after
    async fn with_session<F, Fut>(config: CliAppConfig, timeout_ms: u64, handler: F) -> Result<()>
    where
        F: FnOnce(Arc<Session>) -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        let session = Arc::new(Session::start(config, timeout_ms).await?);
        handler(session).await
    }

    fn handle_encode_ibeacon(uuid: &str, major: u16, minor: u16, measured_power: i8) -> Result<()> {
        let frame = encode_ibeacon(uuid, major, minor, measured_power)?;
        info!(
            "Encoded iBeacon {} major={} minor={} power={}",
            frame.uuid(),
            frame.major(),
            frame.minor(),
            frame.measured_power()
        );
        println!("{}", hex::encode(frame.as_bytes()));
        Ok(())
    }

    async fn handle_status(session: &Session) -> Result<()> {
        let tx_power = session
            .wait(session.controller.read_advertising_channel_tx_power_level()?)
            .await?;
        let snapshot = session.controller.snapshot();

        println!("platform:  {}", snapshot.identity.platform);
        println!("address:   {}", snapshot.identity.address);
        println!("state:     {}", snapshot.power_state);
        println!("mtu:       {}", snapshot.connection.mtu);
        println!("rssi:      {}", snapshot.connection.rssi);
        println!("tx power:  {} dBm", tx_power);
        Ok(())
    }
}
