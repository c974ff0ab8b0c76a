use eframe::egui;
use machina_core::{ComponentId, ComponentKind};
use machina_graph::{LayeredLayouter, VisualGraph};
use std::time::{Duration, Instant};

const MIN_ZOOM: f32 = 0.1;
const MAX_ZOOM: f32 = 4.0;

pub struct CanvasOutput {
    pub clicked_node: Option<ComponentId>,
    pub hovered_node: Option<ComponentId>,
}

#[derive(Clone, Copy)]
struct DragState {
    start_pan: egui::Vec2,
    start_pos: egui::Pos2,
}

/// In-progress camera move toward a focused node.
struct CameraGlide {
    from: egui::Vec2,
    to: egui::Vec2,
    started: Instant,
    duration: Duration,
}

pub struct GraphCanvas {
    zoom: f32,
    pan: egui::Vec2,
    drag_state: Option<DragState>,
    glide: Option<CameraGlide>,
}

impl Default for GraphCanvas {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphCanvas {
    pub fn new() -> Self {
        Self {
            zoom: 1.0,
            pan: egui::Vec2::ZERO,
            drag_state: None,
            glide: None,
        }
    }

    pub fn is_animating(&self) -> bool {
        self.glide.is_some()
    }

    /// Glide the camera so the given graph-space point lands on the
    /// viewport center. Zero duration snaps immediately.
    pub fn focus_on(&mut self, graph_center: egui::Pos2, duration: Duration, now: Instant) {
        let target = -graph_center.to_vec2() * self.zoom;
        if duration.is_zero() {
            self.pan = target;
            self.glide = None;
        } else {
            self.glide = Some(CameraGlide {
                from: self.pan,
                to: target,
                started: now,
                duration,
            });
        }
    }

    pub fn zoom_to_fit(&mut self, bounds: egui::Rect, viewport: egui::Rect, padding: f32) {
        if bounds.width() <= 0.0 || bounds.height() <= 0.0 {
            return;
        }
        let padded = bounds.expand(padding);
        let available = viewport.shrink(padding);
        let scale = (available.width() / padded.width())
            .min(available.height() / padded.height())
            .clamp(MIN_ZOOM, 1.0);
        self.zoom = scale;
        self.pan = -padded.center().to_vec2() * self.zoom;
        self.glide = None;
    }

    /// Bounding rect of all node cards in graph space.
    pub fn graph_bounds(graph: &VisualGraph) -> Option<egui::Rect> {
        let mut nodes = graph.nodes.iter();
        let first = nodes.next()?;
        let size = egui::vec2(LayeredLayouter::NODE_WIDTH, LayeredLayouter::NODE_HEIGHT);
        let mut bounds =
            egui::Rect::from_min_size(egui::pos2(first.position.x, first.position.y), size);
        for node in nodes {
            bounds = bounds
                .union(egui::Rect::from_min_size(
                    egui::pos2(node.position.x, node.position.y),
                    size,
                ));
        }
        Some(bounds)
    }

    /// Graph-space center of a node card.
    pub fn node_center(graph: &VisualGraph, component: ComponentId) -> Option<egui::Pos2> {
        let id = graph.id_for(component)?;
        let node = graph.node(id)?;
        Some(egui::pos2(
            node.position.x + LayeredLayouter::NODE_WIDTH / 2.0,
            node.position.y + LayeredLayouter::NODE_HEIGHT / 2.0,
        ))
    }

    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        rect: egui::Rect,
        graph: &VisualGraph,
        loading: Option<ComponentId>,
        entrance_alpha: f32,
        now: Instant,
    ) -> CanvasOutput {
        let response = ui.allocate_rect(rect, egui::Sense::click_and_drag());
        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, ui.visuals().extreme_bg_color);
        let viewport_center = rect.center();

        self.tick_glide(now);

        let zoom_delta = ui.input(|i| i.zoom_delta());
        if response.hovered() && (zoom_delta - 1.0).abs() > f32::EPSILON {
            let prev_zoom = self.zoom;
            let new_zoom = (self.zoom * zoom_delta).clamp(MIN_ZOOM, MAX_ZOOM);
            if (new_zoom - prev_zoom).abs() > f32::EPSILON {
                self.zoom = new_zoom;
                if let Some(pointer) = response.hover_pos() {
                    let graph_pos = self.screen_to_graph(pointer, viewport_center, prev_zoom);
                    let new_screen = self.graph_to_screen(graph_pos, viewport_center);
                    self.pan += pointer - new_screen;
                }
                self.glide = None;
            }
        }

        if response.drag_started()
            && let Some(pointer) = response.interact_pointer_pos()
        {
            self.drag_state = Some(DragState {
                start_pan: self.pan,
                start_pos: pointer,
            });
            self.glide = None;
        }
        if response.dragged()
            && let (Some(state), Some(pointer)) = (self.drag_state, response.interact_pointer_pos())
        {
            self.pan = state.start_pan + (pointer - state.start_pos);
        }
        if self.drag_state.is_some() && ui.input(|i| !i.pointer.primary_down()) {
            self.drag_state = None;
        }

        let node_size = egui::vec2(
            LayeredLayouter::NODE_WIDTH * self.zoom,
            LayeredLayouter::NODE_HEIGHT * self.zoom,
        );
        let pointer_pos = response.hover_pos();
        let mut hovered_node = None;
        let mut node_rects = Vec::with_capacity(graph.nodes.len());
        for node in &graph.nodes {
            let screen_min =
                self.graph_to_screen(egui::pos2(node.position.x, node.position.y), viewport_center);
            let node_rect = egui::Rect::from_min_size(screen_min, node_size);
            if let Some(pointer) = pointer_pos
                && node_rect.contains(pointer)
            {
                hovered_node = Some(node.component);
            }
            node_rects.push(node_rect);
        }

        self.draw_edges(&painter, graph, viewport_center, ui.visuals());
        for (node, node_rect) in graph.nodes.iter().zip(&node_rects) {
            if !rect.intersects(*node_rect) {
                continue;
            }
            let alpha = if node.newly_added { entrance_alpha } else { 1.0 };
            self.draw_node_card(
                &painter,
                node,
                *node_rect,
                alpha,
                loading == Some(node.component),
                hovered_node == Some(node.component),
                now,
            );
        }

        let clicked_node = if response.clicked() { hovered_node } else { None };
        CanvasOutput {
            clicked_node,
            hovered_node,
        }
    }

    fn tick_glide(&mut self, now: Instant) {
        if let Some(glide) = &self.glide {
            let t = (now.duration_since(glide.started).as_secs_f32()
                / glide.duration.as_secs_f32())
            .clamp(0.0, 1.0);
            let eased = t * t * (3.0 - 2.0 * t);
            self.pan = glide.from + (glide.to - glide.from) * eased;
            if t >= 1.0 {
                self.glide = None;
            }
        }
    }

    fn draw_edges(
        &self,
        painter: &egui::Painter,
        graph: &VisualGraph,
        viewport_center: egui::Pos2,
        visuals: &egui::Visuals,
    ) {
        let stroke = egui::Stroke::new(1.5 * self.zoom.max(0.5), visuals.weak_text_color());
        for edge in &graph.edges {
            let (Some(source), Some(target)) = (graph.node(&edge.source), graph.node(&edge.target))
            else {
                continue;
            };
            // Bottom center of the parent card to top center of the child.
            let start = self.graph_to_screen(
                egui::pos2(
                    source.position.x + LayeredLayouter::NODE_WIDTH / 2.0,
                    source.position.y + LayeredLayouter::NODE_HEIGHT,
                ),
                viewport_center,
            );
            let end = self.graph_to_screen(
                egui::pos2(
                    target.position.x + LayeredLayouter::NODE_WIDTH / 2.0,
                    target.position.y,
                ),
                viewport_center,
            );
            painter.line_segment([start, end], stroke);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_node_card(
        &self,
        painter: &egui::Painter,
        node: &machina_graph::VisualNode,
        rect: egui::Rect,
        alpha: f32,
        loading: bool,
        hovered: bool,
        now: Instant,
    ) {
        let radius = 8.0 * self.zoom;
        let accent = kind_color(node.kind).gamma_multiply(alpha);
        let fill = egui::Color32::from_rgb(45, 55, 72).gamma_multiply(alpha);
        let text_color = egui::Color32::from_rgb(226, 232, 240).gamma_multiply(alpha);

        painter.rect_filled(
            rect.translate(egui::vec2(0.0, 2.0 * self.zoom)),
            radius,
            egui::Color32::from_black_alpha(60).gamma_multiply(alpha),
        );
        painter.rect_filled(rect, radius, fill);
        let border_width = if node.focused || hovered { 2.5 } else { 1.5 };
        painter.rect_stroke(
            rect,
            radius,
            egui::Stroke::new(border_width * self.zoom.max(0.5), accent),
            egui::StrokeKind::Middle,
        );

        painter.text(
            rect.center() - egui::vec2(0.0, 6.0 * self.zoom),
            egui::Align2::CENTER_CENTER,
            &node.label,
            egui::FontId::proportional(14.0 * self.zoom),
            text_color,
        );
        painter.text(
            egui::pos2(rect.center().x, rect.max.y - 14.0 * self.zoom),
            egui::Align2::CENTER_CENTER,
            node.kind.to_string(),
            egui::FontId::proportional(10.0 * self.zoom),
            accent,
        );

        let badge_center = egui::pos2(
            rect.max.x - 14.0 * self.zoom,
            rect.min.y + 14.0 * self.zoom,
        );
        if loading {
            // Pulsing dot while the generator call is outstanding.
            let pulse = (now.elapsed().as_secs_f32() * 6.0).sin().abs();
            let pulse = 0.4 + 0.6 * pulse;
            painter.circle_filled(badge_center, 5.0 * self.zoom, accent.gamma_multiply(pulse));
        } else if node.kind.is_expandable() && !node.has_children {
            let arm = 4.0 * self.zoom;
            let stroke = egui::Stroke::new(1.5 * self.zoom.max(0.5), accent);
            painter.circle_stroke(badge_center, 7.0 * self.zoom, stroke);
            painter.line_segment(
                [
                    badge_center - egui::vec2(arm, 0.0),
                    badge_center + egui::vec2(arm, 0.0),
                ],
                stroke,
            );
            painter.line_segment(
                [
                    badge_center - egui::vec2(0.0, arm),
                    badge_center + egui::vec2(0.0, arm),
                ],
                stroke,
            );
        }
    }

    fn graph_to_screen(&self, graph_pos: egui::Pos2, viewport_center: egui::Pos2) -> egui::Pos2 {
        viewport_center + self.pan + (graph_pos.to_vec2() * self.zoom)
    }

    fn screen_to_graph(
        &self,
        screen_pos: egui::Pos2,
        viewport_center: egui::Pos2,
        zoom: f32,
    ) -> egui::Pos2 {
        let offset = screen_pos - viewport_center - self.pan;
        egui::Pos2::new(offset.x / zoom, offset.y / zoom)
    }
}

fn kind_color(kind: ComponentKind) -> egui::Color32 {
    match kind {
        ComponentKind::Machine => egui::Color32::from_rgb(66, 153, 225),
        ComponentKind::Assembly => egui::Color32::from_rgb(72, 187, 120),
        ComponentKind::Material => egui::Color32::from_rgb(237, 137, 54),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use machina_core::{ComponentTree, PartSpec};

    fn laid_out_graph() -> VisualGraph {
        let mut tree = ComponentTree::new("Bicycle").unwrap();
        tree.append_children(
            tree.root(),
            &[PartSpec::new("Frame"), PartSpec::new("Wheel Assembly")],
        )
        .unwrap();
        let mut graph = VisualGraph::build(&tree);
        let layouter = LayeredLayouter::default();
        let positions = machina_graph::Layouter::execute(&layouter, &graph);
        graph.apply_positions(&positions);
        graph
    }

    #[test]
    fn test_graph_bounds_cover_all_cards() {
        let graph = laid_out_graph();
        let bounds = GraphCanvas::graph_bounds(&graph).unwrap();
        for node in &graph.nodes {
            assert!(bounds.contains(egui::pos2(node.position.x, node.position.y)));
        }
        assert!(bounds.height() >= LayeredLayouter::NODE_HEIGHT + LayeredLayouter::LAYER_SPACING);
    }

    #[test]
    fn test_focus_on_centers_target_point() {
        let mut canvas = GraphCanvas::new();
        canvas.focus_on(egui::pos2(300.0, 150.0), Duration::ZERO, Instant::now());
        let viewport_center = egui::pos2(640.0, 360.0);
        let screen = canvas.graph_to_screen(egui::pos2(300.0, 150.0), viewport_center);
        assert!((screen - viewport_center).length() < 0.001);
    }

    #[test]
    fn test_glide_reaches_target_and_stops() {
        let start = Instant::now();
        let mut canvas = GraphCanvas::new();
        canvas.focus_on(
            egui::pos2(100.0, 100.0),
            Duration::from_millis(400),
            start,
        );
        assert!(canvas.is_animating());

        canvas.tick_glide(start + Duration::from_millis(400));
        assert!(!canvas.is_animating());
        assert_eq!(canvas.pan, -egui::vec2(100.0, 100.0));
    }

    #[test]
    fn test_node_center_accounts_for_card_size() {
        let graph = laid_out_graph();
        let root = graph.nodes[0].component;
        let center = GraphCanvas::node_center(&graph, root).unwrap();
        let node = &graph.nodes[0];
        assert_eq!(center.x, node.position.x + 125.0);
        assert_eq!(center.y, node.position.y + 50.0);
    }
}
