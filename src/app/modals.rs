use egui::{Color32, Context, RichText, Ui};

use super::{
    heading2,
    ui_state_types::{AddAssetForm, EditAssetForm},
    AssetFlowApp, Modal, REQ_ADD, REQ_UPDATE,
};
use crate::{
    allocation::{AllocationPlan, PurchaseKind},
    format::{format_num, format_pct, money},
    io::{export_plan, Endpoint},
    model::{AssetUpdate, NewAsset, CATEGORIES},
};

const PLAN_FILENAME: &str = "plano_aporte.csv";

enum ModalAction {
    Add(NewAsset),
    Update(AssetUpdate),
    AskDelete { id: i64, ticker: String },
    Delete(i64),
    Invalid(String),
}

fn number_field(ui: &mut Ui, label: &str, value: &mut String) {
    ui.label(label);
    ui.add(egui::TextEdit::singleline(value).desired_width(140.0));
    ui.end_row();
}

fn add_form(ui: &mut Ui, form: &mut AddAssetForm, busy: bool) -> Option<ModalAction> {
    egui::Grid::new("add asset").num_columns(2).show(ui, |ui| {
        ui.label("Ticker");
        ui.text_edit_singleline(&mut form.ticker);
        ui.end_row();
        ui.label("Categoria");
        egui::ComboBox::from_id_salt("category")
            .selected_text(form.category.as_str())
            .show_ui(ui, |ui| {
                for c in CATEGORIES {
                    ui.selectable_value(&mut form.category, c.to_string(), c);
                }
            });
        ui.end_row();
        number_field(ui, "Quantidade", &mut form.qtd);
        number_field(ui, "Preço médio", &mut form.pm);
        number_field(ui, "Meta (%)", &mut form.meta);
    });
    ui.separator();
    if ui.add_enabled(!busy, egui::Button::new("Salvar")).clicked() {
        Some(match form.parse() {
            Ok(new) => ModalAction::Add(new),
            Err(e) => ModalAction::Invalid(e.to_string()),
        })
    } else {
        None
    }
}

fn edit_form(ui: &mut Ui, form: &mut EditAssetForm, busy: bool) -> Option<ModalAction> {
    ui.label(RichText::new(&form.tipo).weak());
    egui::Grid::new("edit asset").num_columns(2).show(ui, |ui| {
        number_field(ui, "Quantidade", &mut form.qtd);
        number_field(ui, "Preço médio", &mut form.pm);
        ui.label(format!("Meta (limite: {}%)", format_num(form.max_meta, 1)));
        ui.add(
            egui::Slider::new(&mut form.meta, 0.0..=form.max_meta)
                .step_by(0.5)
                .suffix("%"),
        );
        ui.end_row();
        number_field(ui, "DY manual (%)", &mut form.dy);
        number_field(ui, "LPA", &mut form.lpa);
        number_field(ui, "VPA", &mut form.vpa);
        if form.needs_manual_price {
            number_field(ui, "Preço manual", &mut form.manual_price);
        }
    });
    if form.needs_manual_price {
        ui.label(
            RichText::new("Ativo sem cotação automática: informe o preço atual.")
                .small()
                .weak(),
        );
    }
    ui.separator();
    let mut action = None;
    ui.horizontal(|ui| {
        if ui.add_enabled(!busy, egui::Button::new("Salvar")).clicked() {
            action = Some(match form.parse() {
                Ok(update) => ModalAction::Update(update),
                Err(e) => ModalAction::Invalid(e.to_string()),
            });
        }
        if ui
            .add_enabled(
                !busy,
                egui::Button::new(RichText::new("🗑 Excluir").color(Color32::LIGHT_RED)),
            )
            .clicked()
        {
            action = Some(ModalAction::AskDelete {
                id: form.id,
                ticker: form.ticker.clone(),
            });
        }
        if busy {
            ui.spinner();
        }
    });
    action
}

fn plan_table(ui: &mut Ui, plan: &AllocationPlan, hidden: bool) {
    if plan.purchases.is_empty() {
        ui.label("Nenhum ativo elegível para este valor.");
    } else {
        egui::Grid::new("plan").striped(true).num_columns(6).show(ui, |ui| {
            for h in ["Ativo", "Estratégia", "Qtd", "Preço", "Custo", "Impacto na meta"] {
                ui.label(RichText::new(h).strong());
            }
            ui.end_row();
            for p in &plan.purchases {
                ui.label(RichText::new(&p.ticker).strong())
                    .on_hover_text(p.rationale.join("\n"));
                let color = match p.kind {
                    PurchaseKind::Rebalance => Color32::from_rgb(96, 165, 250),
                    PurchaseKind::Expansion => Color32::from_rgb(192, 132, 252),
                };
                ui.colored_label(color, p.kind.to_string());
                ui.label(p.quantity.to_string());
                ui.label(money(p.unit_price, hidden));
                ui.label(money(p.cost, hidden));
                ui.label(
                    p.gap_impact_pct
                        .map(|x| format_pct(x, 0))
                        .unwrap_or_else(|| "-".to_string()),
                );
                ui.end_row();
            }
        });
    }
    ui.separator();
    ui.label(format!("Total alocado: {}", money(plan.total_allocated(), hidden)));
    ui.label(format!("Capital preservado: {}", money(plan.leftover(), hidden)));
    ui.label(
        RichText::new(format!(
            "Teto de rebalanceamento: {}",
            format_pct(plan.policy.rebalance_global_cap * 100.0, 0)
        ))
        .small()
        .weak(),
    );
    if plan.is_high_leftover() {
        ui.colored_label(
            Color32::from_rgb(251, 191, 36),
            "Sobra elevada: nenhum ativo elegível absorveu o restante do aporte.",
        );
    }
}

impl AssetFlowApp<'_> {
    pub(super) fn modal_windows(&mut self, ctx: &Context) {
        if self.modal == Modal::Allocation {
            self.allocation_window(ctx);
            return;
        }
        let busy = self.write_request.is_in_progress();
        let mut open = true;
        let mut action = None;
        match &mut self.modal {
            Modal::None | Modal::Allocation => return,
            Modal::Add(form) => {
                egui::Window::new("Adicionar ativo")
                    .open(&mut open)
                    .collapsible(false)
                    .show(ctx, |ui| action = add_form(ui, form, busy));
            }
            Modal::Edit(form) => {
                egui::Window::new(format!("Configurar {}", form.ticker))
                    .open(&mut open)
                    .collapsible(false)
                    .show(ctx, |ui| action = edit_form(ui, form, busy));
            }
            Modal::ConfirmDelete { id, ticker } => {
                egui::Window::new("Excluir ativo")
                    .open(&mut open)
                    .collapsible(false)
                    .show(ctx, |ui| {
                        ui.label(format!("Deseja realmente excluir {ticker}?"));
                        ui.horizontal(|ui| {
                            if ui.add_enabled(!busy, egui::Button::new("Excluir")).clicked() {
                                action = Some(ModalAction::Delete(*id));
                            }
                            if busy {
                                ui.spinner();
                            }
                        });
                    });
            }
        }
        if !open {
            self.modal = Modal::None;
        }
        match action {
            Some(ModalAction::Add(new)) => self.post(Endpoint::AddAsset, REQ_ADD, &new, ctx),
            Some(ModalAction::Update(update)) => {
                self.post(Endpoint::UpdateAsset, REQ_UPDATE, &update, ctx)
            }
            Some(ModalAction::AskDelete { id, ticker }) => {
                self.modal = Modal::ConfirmDelete { id, ticker };
            }
            Some(ModalAction::Delete(id)) => self.delete(id, ctx),
            Some(ModalAction::Invalid(msg)) => self.error_dialog = Some(msg),
            None => {}
        }
    }

    fn allocation_window(&mut self, ctx: &Context) {
        let mut open = true;
        let mut simulate = false;
        let mut export = false;
        let hidden = self.privacy;
        egui::Window::new("🧠 Aporte inteligente")
            .open(&mut open)
            .default_width(620.0)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label("Valor do aporte (R$)");
                    let edit = ui.add(
                        egui::TextEdit::singleline(&mut self.simulator.amount)
                            .hint_text("1.000,00")
                            .desired_width(140.0),
                    );
                    let enter = edit.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                    simulate = ui.button("Simular").clicked() || enter;
                });
                ui.separator();
                match &self.plan {
                    None => {
                        ui.label(
                            "Rebalanceia os ativos abaixo da meta e distribui o restante \
                             entre os de melhor score.",
                        );
                    }
                    Some(Err(e)) => {
                        ui.colored_label(Color32::LIGHT_RED, e.to_string());
                    }
                    Some(Ok(plan)) => {
                        heading2(ui, "Plano de compras");
                        plan_table(ui, plan, hidden);
                        export = !plan.purchases.is_empty() && ui.button("Exportar CSV").clicked();
                    }
                }
            });
        if simulate {
            self.run_simulation();
        }
        if export {
            if let Some(Ok(plan)) = &self.plan {
                match export_plan(plan, PLAN_FILENAME) {
                    Ok(filename) => self.status_msg = Some(format!("Plano exportado: {filename}")),
                    Err(e) => self.error_dialog = Some(format!("Falha ao exportar: {e}")),
                }
            }
        }
        if !open {
            self.modal = Modal::None;
        }
    }

    pub(super) fn error_window(&mut self, ctx: &Context) {
        let mut close = false;
        if let Some(msg) = &self.error_dialog {
            egui::Window::new("Erro")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label(msg);
                    close = ui.button("OK").clicked();
                });
        }
        if close {
            self.error_dialog = None;
        }
    }
}
