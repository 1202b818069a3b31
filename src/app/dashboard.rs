use egui::{Color32, Context, ProgressBar, RichText, Ui};

use super::{charts, heading2, AssetFlowApp, Tab, Which};
use crate::{
    format::{format_num, format_pct, format_signed_money, MASK, MASK_SHORT},
    model::{category_summary, Asset, AssetStatus, DashboardData, RadarKind, CATEGORIES},
};

const GREEN: Color32 = Color32::from_rgb(52, 211, 153);
const RED: Color32 = Color32::from_rgb(248, 113, 113);
const AMBER: Color32 = Color32::from_rgb(251, 191, 36);
const BLUE: Color32 = Color32::from_rgb(96, 165, 250);

/// Category summary turns red or green once the deviation leaves this band.
const DEVIATION_TOLERANCE_PP: f64 = 2.0;

fn status_color(status: AssetStatus) -> Color32 {
    match status {
        AssetStatus::CompraForte => GREEN,
        AssetStatus::Comprar => BLUE,
        AssetStatus::Aguardar => AMBER,
        AssetStatus::Manter | AssetStatus::Neutro => Color32::GRAY,
    }
}

fn radar_color(kind: RadarKind) -> Color32 {
    match kind {
        RadarKind::Opportunity => GREEN,
        RadarKind::Adjustment => BLUE,
        RadarKind::HighRisk => RED,
        RadarKind::Support => AMBER,
        RadarKind::Movement => Color32::GRAY,
    }
}

fn deviation_color(deviation: f64) -> Color32 {
    if deviation > DEVIATION_TOLERANCE_PP {
        RED
    } else if deviation < -DEVIATION_TOLERANCE_PP {
        AMBER
    } else {
        GREEN
    }
}

fn signed_color(x: f64) -> Color32 {
    if x >= 0.0 {
        GREEN
    } else {
        RED
    }
}

fn stat_card(ui: &mut Ui, title: &str, value: RichText, subtext: &str) {
    ui.group(|ui| {
        ui.set_min_width(170.0);
        ui.vertical(|ui| {
            ui.label(RichText::new(title).small().strong());
            ui.label(value.size(20.0));
            ui.label(RichText::new(subtext).small().weak());
        });
    });
}

fn risk_radar(ui: &mut Ui, alertas: &[String]) {
    heading2(ui, "Radar de risco");
    if alertas.is_empty() {
        ui.label("Nenhum sinal relevante no momento.");
        return;
    }
    for text in alertas {
        let kind = RadarKind::classify(text);
        ui.horizontal_wrapped(|ui| {
            ui.label(RichText::new(kind.to_string()).strong().color(radar_color(kind)));
            ui.label(text);
        });
    }
}

enum RowAction {
    Edit(String),
    News(String),
}

impl AssetFlowApp<'_> {
    pub(super) fn dashboard_screen(&mut self, ui: &mut Ui, ctx: &Context) {
        ui.horizontal_wrapped(|ui| {
            for tab in Tab::all() {
                if ui
                    .selectable_label(self.tab == tab, tab.label())
                    .clicked()
                {
                    self.tab = tab;
                }
            }
        });
        ui.separator();

        let mut action = None;
        let mut retry = false;
        let mut fetch_correlation = false;
        match &self.dashboard {
            None => {
                ui.spinner();
                ui.label("Carregando carteira...");
            }
            Some(Err(e)) => {
                ui.colored_label(RED, format!("{e}"));
                retry = ui.button("Tentar novamente").clicked();
            }
            Some(Ok(d)) => match self.tab {
                Tab::Resumo => self.resumo_tab(ui, d),
                Tab::Evolucao => match &self.history {
                    Some(Ok(points)) => charts::history_plot(ui, points, self.privacy),
                    Some(Err(e)) => {
                        ui.label(format!("Erro ao buscar histórico: {e}"));
                    }
                    None => {
                        ui.spinner();
                    }
                },
                Tab::Category(i) => {
                    let category = CATEGORIES.get(i).copied();
                    action = self.asset_table(ui, &d.assets_of(category));
                }
                Tab::Radar => risk_radar(ui, &d.alertas),
                Tab::Correlacao => fetch_correlation = self.correlation_tab(ui),
            },
        }
        if fetch_correlation {
            self.get(Which::Correlation, ctx);
        }
        if retry {
            self.dashboard = None;
            self.refresh(false, ctx);
        }
        match action {
            Some(RowAction::Edit(ticker)) => self.open_edit(&ticker),
            Some(RowAction::News(ticker)) => self.open_news(&ticker, ctx),
            None => {}
        }
    }

    fn resumo_tab(&self, ui: &mut Ui, d: &DashboardData) {
        let hidden = self.privacy;
        ui.horizontal_wrapped(|ui| {
            let yoc = if hidden {
                MASK_SHORT.to_string()
            } else {
                format_pct(d.resumo.yield_on_cost(), 2)
            };
            stat_card(ui, "Yield on Cost Médio", RichText::new(yoc), "Anual Est.");
            stat_card(
                ui,
                "Total Investido",
                RichText::new(self.money(d.resumo.total_investido)),
                "Custo de Aquisição",
            );
            let lucro = d.resumo.lucro_total;
            let lucro_text = if hidden {
                MASK.to_string()
            } else {
                format_signed_money(lucro)
            };
            stat_card(
                ui,
                "Lucro / Prejuízo",
                RichText::new(lucro_text).color(signed_color(lucro)),
                "Variação Nominal",
            );
            match d.top_picks(1).first() {
                Some(top) => stat_card(
                    ui,
                    &format!("Top pick: {}", top.ticker),
                    RichText::new(&top.recomendacao).color(status_color(top.status)),
                    &top.motivo,
                ),
                None => stat_card(ui, "Top pick", RichText::new("-"), "Carteira balanceada"),
            }
        });
        ui.add_space(8.0);
        ui.columns(2, |cols| {
            risk_radar(&mut cols[0], &d.alertas);
            self.category_table(&mut cols[1], &d.ativos);
        });
        ui.add_space(8.0);
        heading2(ui, "Alocação atual");
        charts::allocation_bars(ui, &d.grafico, hidden);
        ui.add_space(8.0);
        heading2(ui, "Projeção Monte Carlo");
        match &self.montecarlo {
            Some(Ok(mc)) if mc.is_success() => charts::montecarlo_plot(ui, mc, hidden),
            Some(Ok(_)) => {
                ui.label("Simulação indisponível para a carteira atual.");
            }
            Some(Err(e)) => {
                ui.label(format!("Erro na simulação: {e}"));
            }
            None => {
                ui.spinner();
            }
        }
    }

    fn category_table(&self, ui: &mut Ui, assets: &[Asset]) {
        heading2(ui, "Resumo por categoria");
        egui::Grid::new("category summary")
            .striped(true)
            .num_columns(6)
            .show(ui, |ui| {
                for h in ["Categoria", "Investido", "Atual", "% Atual", "Meta", "Desvio"] {
                    ui.label(RichText::new(h).strong());
                }
                ui.end_row();
                for row in category_summary(assets) {
                    ui.label(&row.tipo);
                    ui.label(self.money(row.investido));
                    ui.label(self.money(row.atual));
                    ui.label(format_pct(row.pct_atual, 1));
                    ui.label(format_pct(row.meta, 0));
                    let dev = row.deviation();
                    ui.colored_label(
                        deviation_color(dev),
                        format!("{}{} pp", if dev > 0.0 { "+" } else { "" }, format_num(dev, 1)),
                    );
                    ui.end_row();
                }
            });
    }

    fn asset_table(&self, ui: &mut Ui, assets: &[&Asset]) -> Option<RowAction> {
        if assets.is_empty() {
            ui.label("Nenhum ativo nesta categoria.");
            return None;
        }
        let show_indicators = matches!(self.tab, Tab::Category(0) | Tab::Category(1));
        let mut edit = None;
        let mut news = None;
        egui::Grid::new("assets")
            .striped(true)
            .spacing([16.0, 6.0])
            .show(ui, |ui| {
                let mut headers = vec!["Ativo", "Posição", "Preço / PM", "Resultado", "Meta", "Aporte"];
                if show_indicators {
                    headers.push("Indicadores");
                }
                headers.push("");
                for h in headers {
                    ui.label(RichText::new(h).strong());
                }
                ui.end_row();
                for a in assets {
                    ui.vertical(|ui| {
                        if ui
                            .link(RichText::new(&a.ticker).strong())
                            .on_hover_text("Editar")
                            .clicked()
                        {
                            edit = Some(a.ticker.clone());
                        }
                        ui.label(RichText::new(format!("Score {}", format_num(a.score, 0))).small());
                    });
                    ui.vertical(|ui| {
                        ui.label(self.money(a.total_atual));
                        ui.label(RichText::new(format!("{} cotas", format_num(a.qtd, 2))).small());
                    });
                    ui.vertical(|ui| {
                        ui.label(self.money(a.preco_atual));
                        ui.label(RichText::new(format!("PM {}", self.money(a.pm))).small());
                    });
                    ui.vertical(|ui| {
                        let result = if self.privacy {
                            MASK.to_string()
                        } else {
                            format_signed_money(a.lucro_valor)
                        };
                        ui.colored_label(signed_color(a.lucro_valor), result);
                        ui.label(RichText::new(format_pct(a.lucro_pct, 2)).small());
                    });
                    ui.vertical(|ui| {
                        let bar = ProgressBar::new((a.target_progress() / 100.0) as f32)
                            .desired_width(110.0)
                            .text(format!(
                                "{} / {}",
                                format_pct(a.pct_na_categoria, 1),
                                format_pct(a.meta, 1)
                            ));
                        let bar = if a.is_overweight() { bar.fill(RED) } else { bar };
                        ui.add(bar);
                    });
                    ui.vertical(|ui| {
                        if a.falta_comprar > 1.0 {
                            ui.colored_label(GREEN, format!("+{}", self.money(a.falta_comprar)));
                        }
                        if a.status.has_badge() {
                            ui.label(
                                RichText::new(&a.recomendacao)
                                    .small()
                                    .strong()
                                    .color(status_color(a.status)),
                            )
                            .on_hover_text(&a.motivo);
                        }
                    });
                    if show_indicators {
                        indicators(ui, a, self.tab);
                    }
                    if ui.button("📰").on_hover_text("Notícias").clicked() {
                        news = Some(a.ticker.clone());
                    }
                    ui.end_row();
                }
            });
        edit.map(RowAction::Edit).or(news.map(RowAction::News))
    }

    /// Returns true when the matrix still has to be fetched.
    fn correlation_tab(&self, ui: &mut Ui) -> bool {
        heading2(ui, "Matriz de correlação");
        match &self.correlation {
            Some(Ok(data)) => charts::correlation_heatmap(ui, data),
            Some(Err(e)) => {
                ui.label(format!("Erro ao calcular correlação: {e}"));
            }
            None => {
                ui.spinner();
                return !self.correlation_request.is_in_progress();
            }
        }
        false
    }

    pub(super) fn news_panel(&mut self, ctx: &Context) {
        let mut close = false;
        if let Some(panel) = &self.news {
            egui::SidePanel::right("news")
                .resizable(true)
                .default_width(320.0)
                .show(ctx, |ui| {
                    ui.horizontal(|ui| {
                        heading2(ui, &format!("Notícias {}", panel.ticker));
                        if ui.button("✖").clicked() {
                            close = true;
                        }
                    });
                    ui.separator();
                    match &panel.items {
                        None => {
                            ui.spinner();
                        }
                        Some(Err(e)) => {
                            ui.label(format!("Não foi possível carregar notícias: {e}"));
                        }
                        Some(Ok(items)) if items.is_empty() => {
                            ui.label("Nenhuma notícia recente.");
                        }
                        Some(Ok(items)) => {
                            egui::ScrollArea::vertical().show(ui, |ui| {
                                for item in items {
                                    ui.hyperlink_to(RichText::new(&item.title).strong(), &item.link);
                                    ui.label(
                                        RichText::new(format!("{} · {}", item.source, item.published))
                                            .small()
                                            .weak(),
                                    );
                                    ui.add_space(6.0);
                                }
                            });
                        }
                    }
                });
        }
        if close {
            self.news = None;
        }
    }

    pub(super) fn alerts_window(&mut self, ctx: &Context) {
        let mut open = self.alerts.open;
        let mut fix = None;
        egui::Window::new("Alertas")
            .open(&mut open)
            .collapsible(false)
            .show(ctx, |ui| {
                if self.alerts.offline {
                    ui.colored_label(RED, "Servidor de alertas offline");
                } else if self.alerts.items.is_empty() {
                    ui.label("Tudo certo por aqui.");
                }
                for alert in &self.alerts.items {
                    ui.horizontal_wrapped(|ui| {
                        let color = if alert.is_critical() { RED } else { AMBER };
                        ui.colored_label(color, RichText::new(&alert.ticker).strong());
                        ui.label(&alert.message);
                        if ui.small_button("Corrigir").clicked() {
                            fix = Some(alert.id);
                        }
                    });
                }
            });
        self.alerts.open = open;
        if let Some(id) = fix {
            self.alerts.open = false;
            self.open_alert_fix(id);
        }
    }
}

fn indicators(ui: &mut Ui, a: &Asset, tab: Tab) {
    ui.vertical(|ui| match (tab, a.magic_number, a.vi_graham) {
        (Tab::Category(1), Some(magic), _) if magic > 0.0 => {
            let text = format!(
                "{}{}/{}",
                if a.reached_magic_number() { "❄ " } else { "" },
                format_num(a.qtd, 0),
                format_num(magic, 0)
            );
            ui.add(
                ProgressBar::new((a.qtd / magic).min(1.0) as f32)
                    .desired_width(90.0)
                    .text(text),
            )
            .on_hover_text("Número mágico");
        }
        (Tab::Category(0), _, Some(vi)) if vi > 0.0 => {
            let mg = a.mg_graham.unwrap_or(0.0);
            ui.colored_label(
                signed_color(mg),
                format!("{}{}%", if mg > 0.0 { "+" } else { "" }, format_num(mg, 0)),
            )
            .on_hover_text(format!("Margem Graham (V.I. {})", format_num(vi, 2)));
        }
        _ => {
            ui.label("-");
        }
    });
}

#[test]
fn test_deviation_color() {
    assert_eq!(deviation_color(0.0), GREEN);
    assert_eq!(deviation_color(2.0), GREEN);
    assert_eq!(deviation_color(-2.0), GREEN);
    assert_eq!(deviation_color(2.5), RED);
    assert_eq!(deviation_color(-2.5), AMBER);
}

#[test]
fn test_badge_colors() {
    assert_eq!(status_color(AssetStatus::CompraForte), GREEN);
    assert_eq!(status_color(AssetStatus::Neutro), Color32::GRAY);
    assert_eq!(radar_color(RadarKind::classify("RSI alto em PETR4")), RED);
}
