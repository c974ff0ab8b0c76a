use crossbeam_channel::Sender;
use machina_core::{ComponentId, ComponentTree, MachinaError};
use machina_events::Event;
use machina_generate::{ChildGenerator, GenerationRequest};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared, single-writer view of the canonical tree. Locks are held only
/// for short synchronous sections, never across a generator await.
pub type TreeHandle = Arc<Mutex<Option<ComponentTree>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpandOutcome {
    /// Children were generated and merged; carries their ids.
    Expanded(Vec<ComponentId>),
    /// Stock material, nothing to decompose.
    NotExpandable,
    /// The same node is already awaiting a response; ignored.
    AlreadyInFlight,
}

/// Orchestrates one expansion cycle: read ancestry, call the generator,
/// merge the result. The merge is all-or-nothing: any collaborator failure
/// leaves the tree exactly as it was.
pub struct ExpansionController {
    tree: TreeHandle,
    generator: Arc<dyn ChildGenerator>,
    events: Sender<Event>,
    in_flight: Mutex<HashSet<ComponentId>>,
    revision: AtomicU64,
}

impl ExpansionController {
    pub fn new(generator: Arc<dyn ChildGenerator>, events: Sender<Event>) -> Self {
        Self {
            tree: Arc::new(Mutex::new(None)),
            generator,
            events,
            in_flight: Mutex::new(HashSet::new()),
            revision: AtomicU64::new(0),
        }
    }

    pub fn tree(&self) -> TreeHandle {
        Arc::clone(&self.tree)
    }

    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    fn publish(&self, event: Event) {
        let _ = self.events.send(event);
    }

    fn bump_revision(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Start a fresh machine: create the root and generate its first-level
    /// components in one atomic step. Any existing tree is only replaced
    /// once the new one is complete.
    pub async fn bootstrap(&self, name: &str) -> Result<ComponentId, MachinaError> {
        let mut tree = ComponentTree::new(name)?;
        let root = tree.root();

        let request = GenerationRequest {
            name: tree[root].name.clone(),
            ancestry: Vec::new(),
            existing_children: Vec::new(),
        };

        self.publish(Event::GenerationStarted { id: root });
        let specs = match self.generator.generate_children(request).await {
            Ok(specs) => specs,
            Err(err) => {
                tracing::warn!(%err, machine = name, "bootstrap generation failed");
                self.publish(Event::GenerationFailed {
                    parent: None,
                    message: err.to_string(),
                });
                return Err(MachinaError::Generation(err.to_string()));
            }
        };

        if let Err(err) = tree.append_children(root, &specs) {
            tracing::warn!(%err, machine = name, "generated payload rejected");
            self.publish(Event::GenerationFailed {
                parent: None,
                message: err.to_string(),
            });
            return Err(MachinaError::Generation(err.to_string()));
        }

        *self.tree.lock() = Some(tree);
        let revision = self.bump_revision();
        self.publish(Event::MachineReady { root });
        self.publish(Event::TreeChanged { revision });
        Ok(root)
    }

    /// Expand one node. Re-entrant calls for a node already awaiting its
    /// response are rejected so a double click cannot insert duplicate
    /// children.
    pub async fn expand(&self, id: ComponentId) -> Result<ExpandOutcome, MachinaError> {
        let request = {
            let guard = self.tree.lock();
            let tree = guard
                .as_ref()
                .ok_or_else(|| MachinaError::InvalidInput("no machine loaded".to_string()))?;
            let node = tree
                .get(id)
                .ok_or_else(|| MachinaError::InvalidInput(format!("unknown component {id}")))?;

            if !node.kind.is_expandable() {
                return Ok(ExpandOutcome::NotExpandable);
            }

            GenerationRequest {
                name: node.name.clone(),
                ancestry: tree.ancestry_of(id),
                existing_children: node
                    .children
                    .iter()
                    .map(|&child| tree[child].name.clone())
                    .collect(),
            }
        };

        if !self.in_flight.lock().insert(id) {
            tracing::debug!(component = %id, "expansion already in flight, ignoring");
            return Ok(ExpandOutcome::AlreadyInFlight);
        }

        self.publish(Event::GenerationStarted { id });
        let result = self.generator.generate_children(request).await;
        self.in_flight.lock().remove(&id);

        let specs = match result {
            Ok(specs) => specs,
            Err(err) => {
                tracing::warn!(%err, component = %id, "generation failed, tree unchanged");
                self.publish(Event::GenerationFailed {
                    parent: Some(id),
                    message: err.to_string(),
                });
                return Err(MachinaError::Generation(err.to_string()));
            }
        };

        let merged = {
            let mut guard = self.tree.lock();
            let tree = guard
                .as_mut()
                .ok_or_else(|| MachinaError::InvalidInput("no machine loaded".to_string()))?;
            tree.append_children(id, &specs)
        };
        let new_children = match merged {
            Ok(children) => children,
            Err(err) => {
                tracing::warn!(%err, component = %id, "generated payload rejected, tree unchanged");
                self.publish(Event::GenerationFailed {
                    parent: Some(id),
                    message: err.to_string(),
                });
                return Err(MachinaError::Generation(err.to_string()));
            }
        };

        let revision = self.bump_revision();
        self.publish(Event::GenerationFinished {
            parent: id,
            new_children: new_children.clone(),
        });
        self.publish(Event::TreeChanged { revision });
        Ok(ExpandOutcome::Expanded(new_children))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use machina_core::{ComponentKind, PartSpec};
    use machina_events::EventBus;
    use machina_generate::GenerateError;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;

    struct MockGenerator {
        responses: Mutex<VecDeque<Result<Vec<PartSpec>, GenerateError>>>,
        seen: Mutex<Vec<GenerationRequest>>,
        gate: Option<tokio::sync::Semaphore>,
    }

    impl MockGenerator {
        fn new(responses: Vec<Result<Vec<PartSpec>, GenerateError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                seen: Mutex::new(Vec::new()),
                gate: None,
            }
        }

        fn gated(responses: Vec<Result<Vec<PartSpec>, GenerateError>>) -> Self {
            Self {
                gate: Some(tokio::sync::Semaphore::new(0)),
                ..Self::new(responses)
            }
        }

        fn requests(&self) -> Vec<GenerationRequest> {
            self.seen.lock().clone()
        }
    }

    impl ChildGenerator for MockGenerator {
        fn generate_children(
            &self,
            request: GenerationRequest,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<PartSpec>, GenerateError>> + Send + '_>>
        {
            self.seen.lock().push(request);
            let result = self.responses.lock().pop_front().unwrap_or(Err(
                GenerateError::InvalidPayload("no more responses".to_string()),
            ));
            Box::pin(async move {
                if let Some(gate) = &self.gate
                    && let Ok(permit) = gate.acquire().await
                {
                    permit.forget();
                }
                result
            })
        }
    }

    fn specs(names: &[&str]) -> Vec<PartSpec> {
        names.iter().map(|n| PartSpec::new(*n)).collect()
    }

    fn controller(
        generator: MockGenerator,
    ) -> (Arc<ExpansionController>, Arc<MockGenerator>, EventBus) {
        let bus = EventBus::new();
        let generator = Arc::new(generator);
        let controller = Arc::new(ExpansionController::new(generator.clone(), bus.sender()));
        (controller, generator, bus)
    }

    #[tokio::test]
    async fn test_bootstrap_builds_root_with_generated_children() {
        let (controller, _, _bus) =
            controller(MockGenerator::new(vec![Ok(specs(&["Frame", "Wheel Assembly"]))]));
        let root = controller.bootstrap("Bicycle").await.unwrap();

        let guard = controller.tree();
        let guard = guard.lock();
        let tree = guard.as_ref().unwrap();
        assert_eq!(tree[root].name, "Bicycle");
        assert_eq!(tree[root].children.len(), 2);
        for &child in &tree[root].children {
            assert_eq!(tree[child].parent, Some(root));
        }
    }

    #[tokio::test]
    async fn test_expand_sends_root_first_ancestry() {
        let (controller, generator, _bus) = controller(MockGenerator::new(vec![
            Ok(specs(&["Frame", "Wheel Assembly"])),
            Ok(specs(&["Hub", "Rim"])),
        ]));
        controller.bootstrap("Bicycle").await.unwrap();

        let wheel = {
            let guard = controller.tree();
            let guard = guard.lock();
            guard
                .as_ref()
                .unwrap()
                .find(|c| c.name == "Wheel Assembly")
                .unwrap()
        };
        controller.expand(wheel).await.unwrap();

        let requests = generator.requests();
        assert_eq!(requests[1].name, "Wheel Assembly");
        assert_eq!(requests[1].ancestry, vec!["Bicycle"]);
    }

    #[tokio::test]
    async fn test_expand_reports_existing_children() {
        let (controller, generator, _bus) = controller(MockGenerator::new(vec![
            Ok(specs(&["Frame", "Wheel Assembly"])),
            Ok(specs(&["Hub", "Rim"])),
            Ok(specs(&["Spoke", "Valve"])),
        ]));
        let root = controller.bootstrap("Bicycle").await.unwrap();
        let wheel = {
            let guard = controller.tree();
            let guard = guard.lock();
            guard.as_ref().unwrap()[root].children[1]
        };

        controller.expand(wheel).await.unwrap();
        controller.expand(wheel).await.unwrap();

        let requests = generator.requests();
        assert!(requests[2].existing_children.contains(&"Hub".to_string()));
        assert!(requests[2].existing_children.contains(&"Rim".to_string()));
    }

    #[tokio::test]
    async fn test_failed_generation_leaves_tree_untouched() {
        let (controller, _, bus) = controller(MockGenerator::new(vec![
            Ok(specs(&["Frame", "Wheel Assembly"])),
            Err(GenerateError::EmptyResponse),
        ]));
        let root = controller.bootstrap("Bicycle").await.unwrap();

        let before = controller.tree().lock().clone();
        let err = controller.expand(root).await.unwrap_err();
        let after = controller.tree().lock().clone();

        assert!(matches!(err, MachinaError::Generation(_)));
        assert_eq!(before, after);

        let failures: Vec<_> = bus
            .receiver()
            .try_iter()
            .filter(|e| matches!(e, Event::GenerationFailed { .. }))
            .collect();
        assert_eq!(failures.len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_merge_surfaces_generation_failed() {
        // Generator succeeds but the payload carries a blank-named child,
        // so the merge itself is what fails. The view only learns about
        // failures through events, so this branch must publish one too.
        let (controller, _, bus) = controller(MockGenerator::new(vec![
            Ok(specs(&["Frame", "Wheel Assembly"])),
            Ok(vec![PartSpec::new("Hub"), PartSpec::new("   ")]),
        ]));
        let root = controller.bootstrap("Bicycle").await.unwrap();
        bus.receiver().try_iter().count();

        let before = controller.tree().lock().clone();
        let err = controller.expand(root).await.unwrap_err();
        assert!(matches!(err, MachinaError::Generation(_)));
        assert_eq!(before, controller.tree().lock().clone());

        let events: Vec<_> = bus.receiver().try_iter().collect();
        assert!(matches!(events[0], Event::GenerationStarted { .. }));
        assert!(matches!(
            events.last(),
            Some(Event::GenerationFailed { parent: Some(p), .. }) if *p == root
        ));
    }

    #[tokio::test]
    async fn test_bootstrap_rejected_merge_surfaces_generation_failed() {
        let (controller, _, bus) = controller(MockGenerator::new(vec![Ok(vec![
            PartSpec::new("Frame"),
            PartSpec::new(""),
        ])]));

        let err = controller.bootstrap("Bicycle").await.unwrap_err();
        assert!(matches!(err, MachinaError::Generation(_)));
        assert!(controller.tree().lock().is_none());

        let failures: Vec<_> = bus
            .receiver()
            .try_iter()
            .filter(|e| matches!(e, Event::GenerationFailed { parent: None, .. }))
            .collect();
        assert_eq!(failures.len(), 1);
    }

    #[tokio::test]
    async fn test_material_nodes_are_not_expanded() {
        let (controller, generator, _bus) = controller(MockGenerator::new(vec![Ok(vec![
            PartSpec::new("Frame"),
            PartSpec::new("Steel Tube").with_kind(ComponentKind::Material),
        ])]));
        let root = controller.bootstrap("Bicycle").await.unwrap();
        let material = {
            let guard = controller.tree();
            let guard = guard.lock();
            guard.as_ref().unwrap()[root].children[1]
        };

        let outcome = controller.expand(material).await.unwrap();
        assert_eq!(outcome, ExpandOutcome::NotExpandable);
        // Only the bootstrap call reached the generator.
        assert_eq!(generator.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_in_flight_node_rejects_second_expand() {
        let (controller, generator, _bus) = controller(MockGenerator::gated(vec![
            Ok(specs(&["Frame", "Wheel Assembly"])),
            Ok(specs(&["Hub", "Rim"])),
        ]));
        generator.gate.as_ref().unwrap().add_permits(1);
        let root = controller.bootstrap("Bicycle").await.unwrap();

        let first = tokio::spawn({
            let controller = controller.clone();
            async move { controller.expand(root).await }
        });
        // Wait until the first request is parked on the gate.
        while generator.requests().len() < 2 {
            tokio::task::yield_now().await;
        }

        let second = controller.expand(root).await.unwrap();
        assert_eq!(second, ExpandOutcome::AlreadyInFlight);

        generator.gate.as_ref().unwrap().add_permits(1);
        let first = first.await.unwrap().unwrap();
        assert!(matches!(first, ExpandOutcome::Expanded(ids) if ids.len() == 2));

        let guard = controller.tree();
        let guard = guard.lock();
        assert_eq!(guard.as_ref().unwrap()[root].children.len(), 4);
    }

    #[tokio::test]
    async fn test_events_follow_mutation_order() {
        let (controller, _, bus) = controller(MockGenerator::new(vec![
            Ok(specs(&["Frame", "Wheel Assembly"])),
            Ok(specs(&["Hub", "Rim"])),
        ]));
        let root = controller.bootstrap("Bicycle").await.unwrap();
        bus.receiver().try_iter().count();

        controller.expand(root).await.unwrap();
        let events: Vec<_> = bus.receiver().try_iter().collect();
        assert!(matches!(events[0], Event::GenerationStarted { .. }));
        assert!(matches!(events[1], Event::GenerationFinished { .. }));
        assert!(matches!(events[2], Event::TreeChanged { .. }));
    }
}
