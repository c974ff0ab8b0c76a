use crate::canvas::GraphCanvas;
use crate::notifications::NotificationManager;
use crate::settings::AppSettings;
use crate::sync::{ExpansionCycle, FOCUS_DURATION};
use eframe::egui;
use machina_app::ExpansionController;
use machina_core::ComponentId;
use machina_events::{Event, EventBus, EventListener};
use machina_generate::GroqClient;
use machina_graph::{LayeredLayouter, Layouter, VisualGraph};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct MachinaApp {
    settings: AppSettings,
    bus: EventBus,
    /// None when no API key is configured; the form is disabled then.
    controller: Option<Arc<ExpansionController>>,
    runtime: tokio::runtime::Runtime,
    graph: VisualGraph,
    layouter: LayeredLayouter,
    cycle: ExpansionCycle,
    canvas: GraphCanvas,
    notifications: NotificationManager,
    machine_name: String,
    bootstrapping: bool,
    fit_pending: bool,
}

impl MachinaApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> anyhow::Result<Self> {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());

        let settings = AppSettings::load();
        let bus = EventBus::new();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;

        let mut notifications = NotificationManager::new();
        let controller = match GroqClient::new(&settings.model) {
            Ok(client) => {
                let client = client
                    .with_base_url(&settings.api_base_url)
                    .with_temperature(settings.temperature);
                Some(Arc::new(ExpansionController::new(
                    Arc::new(client),
                    bus.sender(),
                )))
            }
            Err(err) => {
                notifications.error(format!("Generator unavailable: {err}"));
                None
            }
        };

        let machine_name = settings.last_machine.clone();
        Ok(Self {
            settings,
            bus,
            controller,
            runtime,
            graph: VisualGraph::default(),
            layouter: LayeredLayouter::default(),
            cycle: ExpansionCycle::new(),
            canvas: GraphCanvas::new(),
            notifications,
            machine_name,
            bootstrapping: false,
            fit_pending: false,
        })
    }

    fn drain_events(&mut self) {
        let rx = self.bus.receiver();
        while let Ok(event) = rx.try_recv() {
            self.handle_event(&event);
        }
    }

    /// Rebuild the visual graph from the canonical tree, run the layouter,
    /// then hand the cycle over to the camera.
    fn rebuild_graph(&mut self) {
        let Some(controller) = &self.controller else {
            return;
        };
        let snapshot = controller.tree().lock().clone();
        let Some(tree) = snapshot else {
            return;
        };

        let mut graph = VisualGraph::build(&tree);
        graph.inherit_positions(&self.graph);
        let positions = self.layouter.execute(&graph);
        graph.apply_positions(&positions);
        graph.mark_new(self.cycle.new_children());
        self.graph = graph;

        let ready: HashMap<String, (f32, f32)> = positions
            .iter()
            .map(|(id, &pos)| (id.0.clone(), pos))
            .collect();
        self.bus.publish(Event::LayoutReady { positions: ready });

        let now = Instant::now();
        self.cycle.layout_applied(now);
        if let Some(node) = self.cycle.focus_node() {
            self.graph.set_focused(Some(node));
            self.bus.publish(Event::FocusNode { id: node });
            if let Some(center) = GraphCanvas::node_center(&self.graph, node) {
                self.canvas.focus_on(center, self.focus_duration(), now);
            }
        }
    }

    fn focus_duration(&self) -> Duration {
        let speed = self.settings.animation_speed;
        if speed <= 0.0 {
            Duration::ZERO
        } else {
            FOCUS_DURATION.div_f32(speed)
        }
    }

    fn start_machine(&mut self) {
        let Some(controller) = self.controller.clone() else {
            return;
        };
        let name = self.machine_name.trim().to_string();
        if name.is_empty() {
            return;
        }

        self.bootstrapping = true;
        self.cycle = ExpansionCycle::new();
        self.settings.last_machine = name.clone();
        self.settings.save();
        self.runtime.spawn(async move {
            let _ = controller.bootstrap(&name).await;
        });
    }

    fn request_expand(&mut self, id: ComponentId) {
        let Some(controller) = self.controller.clone() else {
            return;
        };
        let Some(vid) = self.graph.id_for(id).cloned() else {
            return;
        };
        let Some(node) = self.graph.node(&vid) else {
            return;
        };
        if !node.kind.is_expandable() {
            self.notifications
                .info(format!("{} is stock material", node.label));
            return;
        }
        if !self.cycle.begin(id) {
            return;
        }

        self.graph.clear_transient_marks();
        self.bus.publish(Event::ExpandRequested { id });
        self.runtime.spawn(async move {
            let _ = controller.expand(id).await;
        });
    }

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label("Machine:");
            let response = ui.text_edit_singleline(&mut self.machine_name);
            let submitted = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

            let ready = self.controller.is_some()
                && !self.bootstrapping
                && !self.machine_name.trim().is_empty();
            let clicked = ui
                .add_enabled(ready, egui::Button::new("Generate"))
                .clicked();
            if clicked || (submitted && ready) {
                self.start_machine();
            }
            if self.bootstrapping {
                ui.spinner();
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.weak(&self.settings.model);
            });
        });
    }
}

impl EventListener for MachinaApp {
    fn handle_event(&mut self, event: &Event) {
        match event {
            Event::GenerationFinished {
                parent,
                new_children,
            } => {
                self.cycle.generation_finished(*parent, new_children.clone());
            }
            Event::GenerationFailed { message, .. } => {
                self.notifications.error(message);
                self.cycle.generation_failed();
                self.bootstrapping = false;
            }
            Event::MachineReady { .. } => {
                self.bootstrapping = false;
                self.fit_pending = true;
            }
            Event::TreeChanged { .. } => self.rebuild_graph(),
            Event::ShowError { message } => self.notifications.error(message),
            Event::ShowInfo { message } => self.notifications.info(message),
            // Published by this app for outside observers.
            Event::ExpandRequested { .. }
            | Event::GenerationStarted { .. }
            | Event::LayoutReady { .. }
            | Event::FocusNode { .. }
            | Event::ClearTransientMarks => {}
        }
    }
}

impl eframe::App for MachinaApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.drain_events();
        if self.cycle.tick(now) {
            self.graph.clear_transient_marks();
            self.bus.publish(Event::ClearTransientMarks);
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            self.toolbar(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let rect = ui.available_rect_before_wrap();
            if self.fit_pending && !self.graph.nodes.is_empty() {
                if let Some(bounds) = GraphCanvas::graph_bounds(&self.graph) {
                    self.canvas.zoom_to_fit(bounds, rect, 40.0);
                }
                self.fit_pending = false;
            }

            if self.graph.nodes.is_empty() && !self.bootstrapping {
                ui.centered_and_justified(|ui| {
                    ui.weak("Name a machine above to decompose it into parts.");
                });
                return;
            }

            let output = self.canvas.show(
                ui,
                rect,
                &self.graph,
                self.cycle.loading_node(),
                self.cycle.entrance_alpha(now),
                now,
            );
            if let Some(id) = output.clicked_node {
                self.request_expand(id);
            }
        });

        self.notifications.render(ctx);

        if !self.cycle.is_idle() || self.canvas.is_animating() || self.bootstrapping {
            ctx.request_repaint_after(Duration::from_millis(16));
        }
    }
}
