//! BLE GATT server for the Immediate Alert service
//!
//! Advertises as [`config::BLE_DEVICE_NAME`], serves one central at a time and
//! mirrors the Alert Level characteristic into [`AlertLevelCharacteristic`].
//! Notifications requested by the control loop are pushed while connected.

use embassy_futures::join::join;
use embassy_futures::select::{Either, select};
use log::{info, warn};
use trouble_host::prelude::*;

use crate::ble_channel::{AlertLevelCharacteristic, SERVICE_UUID_IMMEDIATE_ALERT};
use crate::{AlertError, config};

/// Max number of connections
const CONNECTIONS_MAX: usize = 1;

/// Max number of L2CAP channels (signal + att)
const L2CAP_CHANNELS_MAX: usize = 2;

#[gatt_server]
struct Server {
    immediate_alert: ImmediateAlertService,
}

#[gatt_service(uuid = "1802")]
struct ImmediateAlertService {
    #[characteristic(uuid = "2a06", read, write, write_without_response, notify)]
    alert_level: u8,
}

/// Static random address derived from the factory MAC
fn random_address(mac: [u8; 6]) -> Address {
    let mut bytes = mac;
    bytes.reverse();
    // Static random addresses have the two top bits set
    bytes[5] |= 0xC0;
    Address::random(bytes)
}

/// Run the BLE host and the GATT server forever
pub async fn run<C: Controller>(
    controller: C,
    mac: [u8; 6],
    characteristic: &AlertLevelCharacteristic,
) -> Result<(), AlertError> {
    let mut resources: HostResources<DefaultPacketPool, CONNECTIONS_MAX, L2CAP_CHANNELS_MAX> =
        HostResources::new();
    let stack =
        trouble_host::new(controller, &mut resources).set_random_address(random_address(mac));
    let Host {
        mut peripheral,
        runner,
        ..
    } = stack.build();

    let server = Server::new_with_config(GapConfig::Peripheral(PeripheralConfig {
        name: config::BLE_DEVICE_NAME,
        appearance: &appearance::UNKNOWN,
    }))
    .map_err(|_| AlertError::BleError)?;

    info!("[BLE] GATT server ready, advertising as {}", config::BLE_DEVICE_NAME);

    let _ = join(host_task(runner), async {
        loop {
            match advertise(&mut peripheral, &server).await {
                Ok(conn) => {
                    info!("[BLE] Central connected");
                    characteristic.discard_notification();
                    serve_connection(&server, &conn, characteristic).await;
                    info!("[BLE] Central disconnected, advertising again");
                }
                Err(e) => {
                    warn!("[BLE] Advertising failed: {:?}", e);
                    embassy_time::Timer::after(config::ACCEPT_INTERVAL).await;
                }
            }
        }
    })
    .await;

    Ok(())
}

async fn host_task<C: Controller, P: PacketPool>(mut runner: Runner<'_, C, P>) {
    loop {
        if let Err(e) = runner.run().await {
            warn!("[BLE] Host runner error: {:?}", e);
        }
    }
}

async fn advertise<'values, 'server, C: Controller>(
    peripheral: &mut Peripheral<'values, C, DefaultPacketPool>,
    server: &'server Server<'values>,
) -> Result<GattConnection<'values, 'server, DefaultPacketPool>, BleHostError<C::Error>> {
    let mut advertiser_data = [0; 31];
    let len = AdStructure::encode_slice(
        &[
            AdStructure::Flags(LE_GENERAL_DISCOVERABLE | BR_EDR_NOT_SUPPORTED),
            AdStructure::ServiceUuids16(&[SERVICE_UUID_IMMEDIATE_ALERT.to_le_bytes()]),
            AdStructure::CompleteLocalName(config::BLE_DEVICE_NAME.as_bytes()),
        ],
        &mut advertiser_data[..],
    )?;
    let advertiser = peripheral
        .advertise(
            &Default::default(),
            Advertisement::ConnectableScannableUndirected {
                adv_data: &advertiser_data[..len],
                scan_data: &[],
            },
        )
        .await?;
    let conn = advertiser.accept().await?.with_attribute_server(server)?;
    Ok(conn)
}

/// Route GATT events and notifications until the central goes away
async fn serve_connection<P: PacketPool>(
    server: &Server<'_>,
    conn: &GattConnection<'_, '_, P>,
    characteristic: &AlertLevelCharacteristic,
) {
    let alert_level = &server.immediate_alert.alert_level;

    loop {
        match select(conn.next(), characteristic.wait_notification()).await {
            Either::First(GattConnectionEvent::Disconnected { reason }) => {
                info!("[BLE] Disconnected: {:?}", reason);
                break;
            }
            Either::First(GattConnectionEvent::Gatt { event }) => {
                match &event {
                    GattEvent::Read(read) if read.handle() == alert_level.handle => {
                        let mut value = [0u8; 1];
                        if characteristic.read_value(&mut value) == 1 {
                            if let Err(e) = server.set(alert_level, &value[0]) {
                                warn!("[BLE] Error updating attribute table: {:?}", e);
                            }
                        }
                    }
                    GattEvent::Write(write) if write.handle() == alert_level.handle => {
                        characteristic.write_value(write.data());
                    }
                    _ => {}
                }
                match event.accept() {
                    Ok(reply) => reply.send().await,
                    Err(e) => warn!("[BLE] Error sending response: {:?}", e),
                }
            }
            Either::First(_) => {}
            Either::Second(level) => {
                if let Err(e) = alert_level.notify(conn, &level).await {
                    warn!("[BLE] Notify failed: {:?}", e);
                } else {
                    info!("[BLE] Notified alert level {}", level);
                }
            }
        }
    }
}
