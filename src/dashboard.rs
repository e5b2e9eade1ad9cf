use std::sync::Arc;

use crate::{
    config::ClientConfig,
    dispatcher::CommandDispatcher,
    health::SystemHealthPanel,
    poller::PollerRegistry,
    selection::SelectionController,
    store::ServoStore,
    transport::ServoApi,
};

/// Everything an operator surface needs, wired to one API and one registry.
pub struct Dashboard<A: ServoApi> {
    pub store: ServoStore,
    pub selection: SelectionController<A>,
    pub commands: CommandDispatcher<A>,
    pub health: SystemHealthPanel<A>,
    registry: PollerRegistry,
}

impl<A: ServoApi> Dashboard<A> {
    /// Seeds the store from `cfg` and mounts the health panel. No servo is
    /// selected yet.
    pub fn mount(api: A, cfg: &ClientConfig, registry: PollerRegistry) -> Self {
        let api = Arc::new(api);
        let store = ServoStore::new(cfg.servo_ids.iter().copied(), cfg.position_range);
        let selection = SelectionController::new(
            Arc::clone(&api),
            store.clone(),
            registry.clone(),
            cfg.servo_poll_period,
        );
        let commands =
            CommandDispatcher::new(Arc::clone(&api), store.clone(), selection.clone(), cfg.calibration);
        let health = SystemHealthPanel::mount(api, registry.clone(), cfg.health_poll_period);
        Self { store, selection, commands, health, registry }
    }

    pub fn registry(&self) -> &PollerRegistry {
        &self.registry
    }

    /// Deselects and stops every timer on the registry.
    pub fn close(&self) {
        self.selection.deselect();
        self.registry.stop_all();
    }
}
