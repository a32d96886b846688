//! End-to-end runs against the simulated adapter with the event loop on a
//! background task

use std::sync::Arc;
use std::time::Duration;

use ble_peripheral::adapter::{
    event_channel, SimulatedAdapter, SimulatedAdapterConfig, SimulatedLink,
};
use ble_peripheral::{
    AdvertisingParams, Characteristic, CharacteristicProperty, EventKind, GattService,
    PeripheralConfig, PeripheralController, PeripheralError, PeripheralEvent, PowerState,
};
use tokio::sync::broadcast;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);

struct Running {
    controller: Arc<PeripheralController<SimulatedAdapter>>,
    link: SimulatedLink,
    events: broadcast::Receiver<PeripheralEvent>,
}

fn start(config: PeripheralConfig, simulator: SimulatedAdapterConfig) -> Running {
    let (events_tx, events_rx) = event_channel();
    let adapter = SimulatedAdapter::new(simulator, events_tx);
    let link = adapter.link();
    let controller = Arc::new(PeripheralController::new(adapter, config));
    let events = controller.subscribe();

    let runner = Arc::clone(&controller);
    tokio::spawn(async move { runner.run(events_rx).await });

    Running {
        controller,
        link,
        events,
    }
}

async fn wait_for_state(events: &mut broadcast::Receiver<PeripheralEvent>, wanted: PowerState) {
    timeout(WAIT, async {
        loop {
            match events.recv().await {
                Ok(PeripheralEvent::StateChange(state)) if state == wanted => break,
                Ok(_) => continue,
                Err(err) => panic!("event stream ended: {}", err),
            }
        }
    })
    .await
    .expect("state change not observed");
}

#[tokio::test]
async fn test_init_then_ibeacon_advertising() {
    let mut running = start(PeripheralConfig::default(), SimulatedAdapterConfig::default());

    running.controller.init().unwrap();
    wait_for_state(&mut running.events, PowerState::PoweredOn).await;

    assert_eq!(running.controller.platform(), "simulated");
    assert_eq!(running.controller.address(), "00:1a:7d:da:71:13");

    let outcome = timeout(
        WAIT,
        running
            .controller
            .start_advertising_ibeacon("74278BDA-B644-4520-8F0C-720EAF059935", 1, 2, -59)
            .unwrap(),
    )
    .await
    .expect("advertising completion timed out");

    assert_eq!(outcome, Ok(()));
    assert!(running.link.is_advertising());
}

#[tokio::test]
async fn test_oversized_eir_data_fails_completion() {
    let mut running = start(PeripheralConfig::default(), SimulatedAdapterConfig::default());
    running.controller.init().unwrap();
    wait_for_state(&mut running.events, PowerState::PoweredOn).await;

    let outcome = timeout(
        WAIT,
        running
            .controller
            .start_advertising_with_eir_data(&[0u8; 40], None)
            .unwrap(),
    )
    .await
    .unwrap();

    match outcome {
        Err(PeripheralError::Adapter(error)) => {
            assert!(error.message().contains("advertising data is 40 bytes"))
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(!running.link.is_advertising());
}

#[tokio::test]
async fn test_connection_lifecycle() {
    let mut running = start(PeripheralConfig::default(), SimulatedAdapterConfig::default());
    running.controller.init().unwrap();
    wait_for_state(&mut running.events, PowerState::PoweredOn).await;

    let service = GattService::new("180F").with_characteristic(
        Characteristic::new("2A19")
            .with_property(CharacteristicProperty::Read)
            .with_value(vec![100]),
    );
    timeout(WAIT, running.controller.set_services(vec![service.clone()]).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(running.link.services(), vec![service]);

    running.link.connect("5c:f3:70:aa:bb:cc", 185).unwrap();
    timeout(WAIT, async {
        while running.controller.mtu() != 185 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("mtu change not applied");

    let rssi = timeout(WAIT, running.controller.update_rssi().unwrap())
        .await
        .unwrap();
    assert_eq!(rssi, Ok(-55));
    assert_eq!(running.controller.rssi(), -55);

    let client = timeout(WAIT, running.controller.disconnect().unwrap())
        .await
        .unwrap();
    assert_eq!(client, Ok("5c:f3:70:aa:bb:cc".to_string()));
    assert!(running.link.connected_client().is_none());
}

#[tokio::test]
async fn test_power_off_blocks_advertising() {
    let mut running = start(PeripheralConfig::default(), SimulatedAdapterConfig::default());
    running.controller.init().unwrap();
    wait_for_state(&mut running.events, PowerState::PoweredOn).await;

    running.link.set_power_state(PowerState::PoweredOff).unwrap();
    wait_for_state(&mut running.events, PowerState::PoweredOff).await;

    let result = running.controller.start_advertising("beacon", &["180D"]);
    assert!(matches!(
        result,
        Err(PeripheralError::InvalidState {
            state: PowerState::PoweredOff,
            ..
        })
    ));
}

#[tokio::test]
async fn test_configured_params_reach_adapter() {
    let params = AdvertisingParams {
        min_interval: 0x0100,
        max_interval: 0x0200,
        ..AdvertisingParams::default()
    };
    let config = PeripheralConfig::new()
        .with_random_address("C0:00:00:00:00:42")
        .with_advertising_params(params.clone());
    let mut running = start(config, SimulatedAdapterConfig::default());

    running.controller.init().unwrap();
    wait_for_state(&mut running.events, PowerState::PoweredOn).await;

    timeout(WAIT, async {
        while running.controller.address() != "C0:00:00:00:00:42" {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("address change not applied");
    assert_eq!(running.link.advertising_params(), Some(params.clone()));
    assert_eq!(running.controller.config().advertising_params, Some(params));
}

#[tokio::test]
async fn test_peer_disconnect_is_republished() {
    let mut running = start(PeripheralConfig::default(), SimulatedAdapterConfig::default());
    running.controller.init().unwrap();
    wait_for_state(&mut running.events, PowerState::PoweredOn).await;

    running.link.connect("5c:f3:70:aa:bb:cc", 64).unwrap();
    running.link.drop_connection().unwrap();
    // Nobody connected any more: nothing to report
    running.link.drop_connection().unwrap();

    let republished = timeout(WAIT, async {
        let mut seen = Vec::new();
        loop {
            match running.events.recv().await {
                Ok(event @ PeripheralEvent::Disconnect { .. }) => {
                    seen.push(event);
                    return seen;
                }
                Ok(event) => seen.push(event),
                Err(err) => panic!("event stream ended: {}", err),
            }
        }
    })
    .await
    .expect("disconnect not republished");

    assert_eq!(
        republished,
        vec![
            PeripheralEvent::Accept {
                client_address: "5c:f3:70:aa:bb:cc".to_string()
            },
            PeripheralEvent::MtuChange(64),
            PeripheralEvent::Disconnect {
                client_address: "5c:f3:70:aa:bb:cc".to_string()
            },
        ]
    );
    assert!(running.link.connected_client().is_none());
    assert!(matches!(
        running.events.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));
}

#[tokio::test]
async fn test_silent_adapter_leaves_completion_pending() {
    let running = start(
        PeripheralConfig::default(),
        SimulatedAdapterConfig {
            power_state: PowerState::PoweredOn,
            ..SimulatedAdapterConfig::default()
        },
    );

    // No client is connected, so the adapter never answers
    let pending = running.controller.disconnect().unwrap();
    assert_eq!(pending.event(), EventKind::Disconnect);
    assert!(timeout(Duration::from_millis(50), pending).await.is_err());
}
