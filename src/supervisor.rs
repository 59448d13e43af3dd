//! Bridge supervisor (C8): owns the MQTT client, the AGV sessions, the failed set,
//! the reconnect task, the scheduled publishers, and the last-known state cache.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use parking_lot::Mutex as SyncMutex;
use paho_mqtt as mqtt;
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{error, info, warn};

use crate::cache::Cache;
use crate::config::{AgvConfig, BrokerConfig};
use crate::error::BridgeError;
use crate::mqtt_utils;
use crate::protocol::registry::{self, MSG_GRAB_AUTHORITY, MSG_MOVE_TASK_LIST, MSG_STATE_PUSH};
use crate::protocol::vda5050::factsheet::{AgvGeometry, Factsheet, LoadSpecification};
use crate::protocol::vda5050::{ConnectionState, Header, InstantActions, Order};
use crate::session::{AgvSession, SessionEvent, SessionState};
use crate::translate::{instant_actions as ia_translate, order as order_translate, uplink};
use crate::utils::{parse_downlink_topic, uplink_topic};

const RECONNECT_PERIOD: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
struct PublishPeriods {
    state: Duration,
    visualization: Duration,
    connection: Duration,
    factsheet: Duration,
}

impl PublishPeriods {
    fn for_agv(cfg: &AgvConfig) -> Self {
        let ms = &cfg.publish_intervals_ms;
        Self {
            state: Duration::from_millis(ms.state.unwrap_or(1000)),
            visualization: Duration::from_millis(ms.visualization.unwrap_or(2000)),
            connection: Duration::from_millis(ms.connection.unwrap_or(5000)),
            factsheet: Duration::from_millis(ms.factsheet.unwrap_or(30_000)),
        }
    }
}

fn period_for(periods: &PublishPeriods, kind: &str) -> Duration {
    match kind {
        "state" => periods.state,
        "visualization" => periods.visualization,
        "connection" => periods.connection,
        "factsheet" => periods.factsheet,
        _ => Duration::from_secs(1),
    }
}

fn build_factsheet(cfg: &AgvConfig, header: Header) -> Factsheet {
    Factsheet {
        header_id: None,
        timestamp: None,
        version: String::new(),
        manufacturer: String::new(),
        serial_number: String::new(),
        type_specification: cfg.type_spec.clone().unwrap_or_default(),
        physical_parameters: cfg.physical_parameters.clone().unwrap_or_default(),
        protocol_limits: cfg.protocol_limits.clone().unwrap_or_default(),
        protocol_features: cfg.protocol_features.clone().unwrap_or_default(),
        agv_geometry: AgvGeometry::default(),
        load_specification: LoadSpecification::default(),
    }
    .with_header(header)
}

struct AgvEntry {
    config: AgvConfig,
    session: Arc<AgvSession>,
    periods: PublishPeriods,
}

pub struct BridgeSupervisor {
    mqtt_client: mqtt::AsyncClient,
    agvs: Arc<RwLock<HashMap<String, AgvEntry>>>,
    failed: Arc<SyncMutex<HashSet<String>>>,
    cache: Arc<SyncMutex<Cache>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    header_counter: Arc<SyncMutex<u32>>,
}

impl BridgeSupervisor {
    pub fn new(broker: &BrokerConfig) -> Result<Self, BridgeError> {
        let client = mqtt::AsyncClient::new(mqtt_utils::create_opts(broker))?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok(Self {
            mqtt_client: client,
            agvs: Arc::new(RwLock::new(HashMap::new())),
            failed: Arc::new(SyncMutex::new(HashSet::new())),
            cache: Arc::new(SyncMutex::new(Cache::new())),
            shutdown_tx,
            shutdown_rx,
            header_counter: Arc::new(SyncMutex::new(1)),
        })
    }

    fn next_header_id(&self) -> u32 {
        let mut c = self.header_counter.lock();
        let id = *c;
        *c = c.wrapping_add(1);
        id
    }

    /// Start sequence per §4.8: connect, subscribe, open all AGV ports, start the
    /// reconnect task and scheduled publishers, then emit initial connection/factsheet.
    pub async fn start(&self, broker: &BrokerConfig, agv_configs: Vec<AgvConfig>) -> Result<(), BridgeError> {
        let connect_opts = mqtt_utils::connect_opts(broker);
        self.mqtt_client.connect(connect_opts).await?;

        self.mqtt_client
            .subscribe_many(
                &["/uagv/v2/+/+/order".to_string(), "/uagv/v2/+/+/instantActions".to_string()],
                &[0, 0],
            )
            .await?;
        info!("subscribed to downlink topics");

        let (events_tx, events_rx) = mpsc::unbounded_channel();

        for cfg in agv_configs {
            let serial = cfg.robot_info.serial_number.clone();
            let ports: HashMap<_, _> = [
                (registry::PortRole::StatePush, cfg.tcp_ports.state_push),
                (registry::PortRole::Movement, cfg.tcp_ports.movement),
                (registry::PortRole::Relocation, cfg.tcp_ports.relocation),
                (registry::PortRole::Authority, cfg.tcp_ports.authority),
                (registry::PortRole::Safety, cfg.tcp_ports.safety),
            ]
            .into_iter()
            .collect();

            let session = Arc::new(AgvSession::new(
                serial.clone(),
                cfg.network.ip_address.clone(),
                ports,
                events_tx.clone(),
                self.shutdown_rx.clone(),
            ));
            let periods = PublishPeriods::for_agv(&cfg);
            self.cache.lock().ensure(&serial);

            let opened = session.open_all().await;
            if opened.is_empty() {
                self.failed.lock().insert(serial.clone());
                warn!(%serial, "initial connect failed on all ports");
            } else {
                info!(%serial, ?opened, "AGV connected");
            }

            self.agvs.write().await.insert(
                serial.clone(),
                AgvEntry {
                    config: cfg,
                    session,
                    periods,
                },
            );

            if !opened.is_empty() {
                self.emit_connection(&serial, ConnectionState::Online).await;
                self.emit_factsheet(&serial).await;
            }
        }

        self.spawn_reconnect_task();
        self.spawn_publishers().await;
        self.spawn_event_loop(events_rx);
        self.spawn_mqtt_loop();

        Ok(())
    }

    fn spawn_mqtt_loop(&self) {
        let client = self.mqtt_client.clone();
        let agvs = Arc::clone(&self.agvs);
        let header_counter = Arc::clone(&self.header_counter);
        let cache = Arc::clone(&self.cache);
        let mut shutdown = self.shutdown_rx.clone();
        tokio::spawn(async move {
            let mut stream = client.get_stream(64);
            loop {
                tokio::select! {
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                    msg = stream.next() => {
                        match msg {
                            Some(Some(msg)) => {
                                route_downlink(&agvs, &header_counter, &cache, msg).await;
                            }
                            Some(None) => {
                                warn!("MQTT connection lost, reconnecting");
                                while let Err(e) = client.reconnect().await {
                                    warn!(error = %e, "MQTT reconnect failed");
                                    tokio::time::sleep(Duration::from_secs(1)).await;
                                }
                            }
                            None => break,
                        }
                    }
                }
            }
        });
    }

    fn spawn_reconnect_task(&self) {
        let agvs = Arc::clone(&self.agvs);
        let failed = Arc::clone(&self.failed);
        let mut shutdown = self.shutdown_rx.clone();
        let this_cache = Arc::clone(&self.cache);
        let header_counter = Arc::clone(&self.header_counter);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(RECONNECT_PERIOD);
            loop {
                tokio::select! {
                    _ = shutdown.changed() => if *shutdown.borrow() { break },
                    _ = ticker.tick() => {
                        let serials: Vec<String> = failed.lock().iter().cloned().collect();
                        for serial in serials {
                            let session = agvs.read().await.get(&serial).map(|e| Arc::clone(&e.session));
                            let Some(session) = session else { continue };
                            let opened = session.open_all().await;
                            if !opened.is_empty() {
                                failed.lock().remove(&serial);
                                let header_id = {
                                    let mut c = header_counter.lock();
                                    let id = *c;
                                    *c = c.wrapping_add(1);
                                    id
                                };
                                let agvs_guard = agvs.read().await;
                                if let Some(entry) = agvs_guard.get(&serial) {
                                    let conn = uplink::connection_uplink(
                                        header_id,
                                        &entry.config.robot_info.manufacturer,
                                        &serial,
                                        ConnectionState::Online,
                                    );
                                    this_cache.lock().update(&serial, |e| e.last_connection = Some(conn.clone()));

                                    let fs_header_id = {
                                        let mut c = header_counter.lock();
                                        let id = *c;
                                        *c = c.wrapping_add(1);
                                        id
                                    };
                                    let header = Header::new(fs_header_id, &entry.config.robot_info.manufacturer, &serial);
                                    let fs = build_factsheet(&entry.config, header);
                                    this_cache.lock().update(&serial, |e| e.last_factsheet = Some(fs));

                                    drop(agvs_guard);
                                    info!(%serial, "reconnected");
                                }
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns one scheduled-publisher task per topic kind. Each AGV may configure its own
    /// period (§4.8); the task wakes on a tight tick and publishes only the AGVs whose
    /// period has actually elapsed, tracked per serial in `last_published`.
    async fn spawn_publishers(&self) {
        for kind in ["state", "visualization", "connection", "factsheet"] {
            let agvs = Arc::clone(&self.agvs);
            let cache = Arc::clone(&self.cache);
            let client = self.mqtt_client.clone();
            let mut shutdown = self.shutdown_rx.clone();
            let kind = kind.to_string();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_millis(200));
                let mut last_published: HashMap<String, tokio::time::Instant> = HashMap::new();
                loop {
                    tokio::select! {
                        _ = shutdown.changed() => if *shutdown.borrow() { break },
                        _ = ticker.tick() => {
                            let now = tokio::time::Instant::now();
                            let due: Vec<(String, String)> = agvs
                                .read()
                                .await
                                .iter()
                                .filter(|(serial, entry)| {
                                    let period = period_for(&entry.periods, &kind);
                                    last_published
                                        .get(*serial)
                                        .map(|last| now.duration_since(*last) >= period)
                                        .unwrap_or(true)
                                })
                                .map(|(s, e)| (s.clone(), e.config.robot_info.manufacturer.clone()))
                                .collect();
                            for (serial, manufacturer) in due {
                                let Some(snap) = cache.lock().snapshot(&serial) else { continue };
                                let body = match kind.as_str() {
                                    "state" => snap.last_state.as_ref().map(|s| serde_json::to_value(s).unwrap()),
                                    "visualization" => snap.last_visualization.as_ref().map(|v| serde_json::to_value(v).unwrap()),
                                    "connection" => snap.last_connection.as_ref().map(|c| serde_json::to_value(c).unwrap()),
                                    "factsheet" => snap.last_factsheet.as_ref().map(|f| serde_json::to_value(f).unwrap()),
                                    _ => None,
                                };
                                if let Some(body) = body {
                                    let topic = uplink_topic(&manufacturer, &serial, &kind);
                                    if let Err(e) = mqtt_utils::publish_json(&client, &topic, &body).await {
                                        warn!(%serial, kind = %kind, error = %e, "publish failed");
                                    }
                                    last_published.insert(serial, now);
                                }
                            }
                        }
                    }
                }
            });
        }
    }

    fn spawn_event_loop(&self, mut events_rx: mpsc::UnboundedReceiver<SessionEvent>) {
        let agvs = Arc::clone(&self.agvs);
        let failed = Arc::clone(&self.failed);
        let cache = Arc::clone(&self.cache);
        let header_counter = Arc::clone(&self.header_counter);
        let mut shutdown = self.shutdown_rx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => if *shutdown.borrow() { break },
                    event = events_rx.recv() => {
                        let Some(event) = event else { break };
                        handle_session_event(&agvs, &failed, &cache, &header_counter, event).await;
                    }
                }
            }
        });
    }

    async fn emit_connection(&self, serial: &str, state: ConnectionState) {
        let agvs = self.agvs.read().await;
        let Some(entry) = agvs.get(serial) else { return };
        let conn = uplink::connection_uplink(self.next_header_id(), &entry.config.robot_info.manufacturer, serial, state);
        self.cache.lock().update(serial, |e| e.last_connection = Some(conn));
    }

    async fn emit_factsheet(&self, serial: &str) {
        let agvs = self.agvs.read().await;
        let Some(entry) = agvs.get(serial) else { return };
        let header = Header::new(self.next_header_id(), &entry.config.robot_info.manufacturer, serial);
        let fs = build_factsheet(&entry.config, header);
        self.cache.lock().update(serial, |e| e.last_factsheet = Some(fs));
    }

    /// Per §4.8, shutdown closes every session and each emits an `OFFLINE` connection
    /// state. The scheduled connection-publisher only runs on its own tick, which could
    /// lose the race against `disconnect` below, so the OFFLINE uplink is published here
    /// directly rather than left to the cache + scheduled publisher.
    pub async fn shutdown(&self) {
        let agvs = self.agvs.read().await;
        for (serial, entry) in agvs.iter() {
            let header_id = self.next_header_id();
            let conn = uplink::connection_uplink(header_id, &entry.config.robot_info.manufacturer, serial, ConnectionState::Offline);
            self.cache.lock().update(serial, |e| e.last_connection = Some(conn.clone()));
            let topic = uplink_topic(&entry.config.robot_info.manufacturer, serial, "connection");
            let body = serde_json::to_value(&conn).expect("connection state always serializes");
            if let Err(e) = mqtt_utils::publish_json(&self.mqtt_client, &topic, &body).await {
                warn!(%serial, error = %e, "failed to publish OFFLINE connection state on shutdown");
            }
        }
        for (serial, entry) in agvs.iter() {
            entry.session.close_all().await;
            info!(%serial, "session closed");
        }
        drop(agvs);
        let _ = self.shutdown_tx.send(true);
        let _ = self.mqtt_client.disconnect(None).await;
    }
}

async fn route_downlink(
    agvs: &Arc<RwLock<HashMap<String, AgvEntry>>>,
    header_counter: &Arc<SyncMutex<u32>>,
    cache: &Arc<SyncMutex<Cache>>,
    msg: mqtt::Message,
) {
    let Some(topic) = parse_downlink_topic(msg.topic()) else {
        warn!(topic = msg.topic(), "unroutable downlink topic");
        return;
    };
    let payload = msg.payload();

    let agvs_guard = agvs.read().await;
    let Some(entry) = agvs_guard.get(&topic.serial_number) else {
        warn!(serial = %topic.serial_number, "downlink for unconnected AGV, dropping");
        return;
    };
    let session = Arc::clone(&entry.session);
    drop(agvs_guard);

    match topic.kind.as_str() {
        "order" => match serde_json::from_slice::<Order>(payload) {
            Ok(order) => {
                let body = order_translate::translate_order(&order);
                let bytes = serde_json::to_vec(&body).expect("move-task list always serializes");
                if let Err(e) = session.send(registry::PortRole::Movement, MSG_MOVE_TASK_LIST, &bytes).await {
                    warn!(serial = %topic.serial_number, error = %e, "order send failed");
                }
            }
            Err(e) => warn!(serial = %topic.serial_number, error = %e, "malformed order payload"),
        },
        "instantActions" => match serde_json::from_slice::<InstantActions>(payload) {
            Ok(mut ia) => {
                // factsheetRequest has no vendor wire shape (spec §4.5): it triggers an
                // immediate supervisor-side factsheet publish instead of a TCP egress.
                let wants_factsheet = ia.actions.iter().any(|a| a.action_type.as_str() == "factsheetRequest");
                ia.actions.retain(|a| a.action_type.as_str() != "factsheetRequest");

                if wants_factsheet {
                    let agvs_guard = agvs.read().await;
                    if let Some(entry) = agvs_guard.get(&topic.serial_number) {
                        let header_id = {
                            let mut c = header_counter.lock();
                            let id = *c;
                            *c = c.wrapping_add(1);
                            id
                        };
                        let header = Header::new(header_id, &entry.config.robot_info.manufacturer, &topic.serial_number);
                        let fs = build_factsheet(&entry.config, header);
                        cache.lock().update(&topic.serial_number, |e| e.last_factsheet = Some(fs));
                    }
                }

                for packet in ia_translate::translate_instant_actions(&ia) {
                    let bytes = serde_json::to_vec(&packet.body).expect("instant action body always serializes");
                    if let Err(e) = session.send(packet.port_role, packet.message_type, &bytes).await {
                        warn!(serial = %topic.serial_number, error = %e, "instant action send failed");
                    }
                }
            }
            Err(e) => warn!(serial = %topic.serial_number, error = %e, "malformed instant actions payload"),
        },
        other => warn!(kind = other, "unknown downlink kind"),
    }
}

/// Sends the `grabAuthority` preemption packet on the freshly-opened authority port, per
/// §4.7. Public so integration tests can drive this exact reaction against a real session
/// instead of duplicating the packet-build-and-send logic.
pub async fn send_authority_preemption(session: &AgvSession, nickname: &str) -> Result<(), crate::error::SessionError> {
    let body = ia_translate::grab_authority_packet(nickname);
    let bytes = serde_json::to_vec(&body).expect("grabAuthority body always serializes");
    session.send(registry::PortRole::Authority, MSG_GRAB_AUTHORITY, &bytes).await
}

async fn handle_session_event(
    agvs: &Arc<RwLock<HashMap<String, AgvEntry>>>,
    failed: &Arc<SyncMutex<HashSet<String>>>,
    cache: &Arc<SyncMutex<Cache>>,
    header_counter: &Arc<SyncMutex<u32>>,
    event: SessionEvent,
) {
    match event {
        SessionEvent::Frame {
            serial,
            port_role,
            message_type,
            body,
        } => {
            if port_role != registry::PortRole::StatePush || message_type != MSG_STATE_PUSH {
                return;
            }
            let Ok(vendor) = serde_json::from_slice::<serde_json::Value>(&body) else {
                warn!(%serial, "state push body is not valid JSON");
                return;
            };
            let manufacturer = agvs
                .read()
                .await
                .get(&serial)
                .map(|e| e.config.robot_info.manufacturer.clone())
                .unwrap_or_default();
            let header_id = {
                let mut c = header_counter.lock();
                let id = *c;
                *c = c.wrapping_add(1);
                id
            };
            let (order_id, order_update_id) = {
                let snap = cache.lock().snapshot(&serial);
                snap.and_then(|s| s.last_state.as_ref().map(|st| (st.order_id.clone(), st.order_update_id)))
                    .unwrap_or_else(|| (format!("order_{serial}"), 0))
            };
            let state = uplink::state_from_vendor(&vendor, header_id, &manufacturer, &order_id, order_update_id);
            let viz = uplink::visualization_from_vendor(&vendor, header_id, &manufacturer, &serial);
            cache.lock().update(&serial, |e| {
                e.last_vendor_payload = Some(vendor.clone());
                e.last_state = Some(state.clone());
                e.last_visualization = Some(viz.clone());
            });
        }
        SessionEvent::PortOpened { serial, port_role } => {
            if port_role == registry::PortRole::Authority {
                let agvs_guard = agvs.read().await;
                if let Some(entry) = agvs_guard.get(&serial) {
                    let session = Arc::clone(&entry.session);
                    let nickname = entry.config.authority_nickname().to_string();
                    drop(agvs_guard);
                    if let Err(e) = send_authority_preemption(&session, &nickname).await {
                        error!(%serial, error = %e, "authority preemption send failed");
                    }
                }
            }
        }
        SessionEvent::PortClosed { serial, port_role } => {
            warn!(%serial, port_role = %port_role, "port closed");
            let agvs_guard = agvs.read().await;
            if let Some(entry) = agvs_guard.get(&serial) {
                if !entry.session.is_healthy() {
                    failed.lock().insert(serial.clone());
                    let manufacturer = entry.config.robot_info.manufacturer.clone();
                    drop(agvs_guard);
                    let header_id = {
                        let mut c = header_counter.lock();
                        let id = *c;
                        *c = c.wrapping_add(1);
                        id
                    };
                    let conn = uplink::connection_uplink(header_id, &manufacturer, &serial, ConnectionState::Offline);
                    cache.lock().update(&serial, |e| e.last_connection = Some(conn));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_periods_fall_back_to_spec_defaults() {
        let cfg = AgvConfig {
            robot_info: crate::config::RobotInfo {
                serial_number: "s".to_string(),
                manufacturer: "m".to_string(),
            },
            network: crate::config::NetworkConfig {
                ip_address: "127.0.0.1".to_string(),
            },
            tcp_ports: crate::config::TcpPorts::default(),
            physical_parameters: None,
            type_spec: None,
            protocol_limits: None,
            protocol_features: None,
            publish_intervals_ms: crate::config::PublishIntervalsMs::default(),
            authority_nickname: None,
        };
        let periods = PublishPeriods::for_agv(&cfg);
        assert_eq!(periods.state, Duration::from_millis(1000));
        assert_eq!(periods.factsheet, Duration::from_millis(30_000));
    }
}
