use crate::{
    date::Date,
    format::{format_money, format_num, MASK_SHORT},
    model::{CorrelationBand, CorrelationData, HistoryPoint, MonteCarloData, Slice},
};

use egui::{Color32, RichText, Ui};
use egui_plot::{Bar, BarChart, Corner, GridMark, Legend, Line, Plot};
use std::{ops::RangeInclusive, str::FromStr};

const PLOT_HEIGHT: f32 = 260.0;

/// Named series over an index axis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chart {
    name: String,
    values: Vec<f64>,
}
impl Chart {
    pub fn new(name: &str, values: Vec<f64>) -> Self {
        Chart {
            name: name.to_string(),
            values,
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn points(&self) -> Vec<[f64; 2]> {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .map(|(i, v)| [i as f64, *v])
            .collect()
    }
}

fn label_at(labels: &[String], x: f64) -> String {
    if x.fract().abs() < 1e-6 && x >= 0.0 {
        labels.get(x.round() as usize).cloned().unwrap_or_default()
    } else {
        String::new()
    }
}

fn money_axis(hidden: bool) -> impl Fn(GridMark, &RangeInclusive<f64>) -> String {
    move |y: GridMark, _range: &RangeInclusive<f64>| {
        if hidden {
            MASK_SHORT.to_string()
        } else if y.value.abs() >= 1000.0 {
            format!("{}k", format_num(y.value / 1000.0, 0))
        } else {
            format_num(y.value, 0)
        }
    }
}

fn plot_lines(ui: &mut Ui, id: &str, charts: &[Chart], labels: Vec<String>, hidden: bool) {
    let x_fmt = move |x: GridMark, _range: &RangeInclusive<f64>| label_at(&labels, x.value);
    Plot::new(id)
        .legend(Legend::default().position(Corner::LeftTop))
        .height(PLOT_HEIGHT)
        .allow_scroll(false)
        .show_x(false)
        .show_y(!hidden)
        .x_axis_formatter(x_fmt)
        .y_axis_formatter(money_axis(hidden))
        .show(ui, |plot_ui| {
            for c in charts {
                plot_ui.line(Line::new(c.name().to_string(), c.points()));
            }
        });
}

/// Net worth against invested capital.
pub fn history_charts(points: &[HistoryPoint]) -> (Vec<Chart>, Vec<String>) {
    let labels = points
        .iter()
        .map(|p| {
            Date::from_str(&p.date)
                .map(|d| d.to_br_string())
                .unwrap_or_else(|_| p.date.clone())
        })
        .collect();
    let charts = vec![
        Chart::new("Patrimônio", points.iter().map(|p| p.patrimonio).collect()),
        Chart::new("Investido", points.iter().map(|p| p.investido).collect()),
    ];
    (charts, labels)
}

pub fn history_plot(ui: &mut Ui, points: &[HistoryPoint], hidden: bool) {
    if points.is_empty() {
        ui.label("Sem histórico ainda.");
        return;
    }
    let (charts, labels) = history_charts(points);
    plot_lines(ui, "history", &charts, labels, hidden);
}

pub fn montecarlo_charts(data: &MonteCarloData) -> (Vec<Chart>, Vec<String>) {
    let p = &data.projecao;
    let n = p.medio.len().max(p.pior_caso.len()).max(p.melhor_caso.len());
    let labels = (0..n).map(|i| format!("Mês {i}")).collect();
    let charts = vec![
        Chart::new("Pessimista", p.pior_caso.clone()),
        Chart::new("Realista", p.medio.clone()),
        Chart::new("Otimista", p.melhor_caso.clone()),
    ];
    (charts, labels)
}

pub fn montecarlo_plot(ui: &mut Ui, data: &MonteCarloData, hidden: bool) {
    ui.label(format!(
        "Volatilidade anual: {}",
        data.volatility_label()
    ));
    let (charts, labels) = montecarlo_charts(data);
    plot_lines(ui, "monte carlo", &charts, labels, hidden);
    if let Some(last) = data.projecao.medio.last() {
        let end = if hidden {
            MASK_SHORT.to_string()
        } else {
            format_money(*last)
        };
        ui.label(format!("Cenário realista ao final: {end}"));
    }
}

/// Current value per category as bars.
pub fn allocation_bars(ui: &mut Ui, slices: &[Slice], hidden: bool) {
    let total: f64 = slices.iter().map(|s| s.value).sum();
    let bars = slices
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let pct = if total > 0.0 { s.value / total * 100.0 } else { 0.0 };
            Bar::new(i as f64, pct).name(format!("{} ({})", s.name, format_num(pct, 1)))
        })
        .collect::<Vec<_>>();
    let labels = slices.iter().map(|s| s.name.clone()).collect::<Vec<_>>();
    let x_fmt = move |x: GridMark, _range: &RangeInclusive<f64>| label_at(&labels, x.value);
    Plot::new("allocation")
        .height(PLOT_HEIGHT * 0.75)
        .allow_scroll(false)
        .allow_drag(false)
        .show_x(false)
        .show_y(!hidden)
        .x_axis_formatter(x_fmt)
        .y_axis_formatter(|y: GridMark, _range: &RangeInclusive<f64>| {
            format!("{}%", format_num(y.value, 0))
        })
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new("alocação", bars).width(0.6));
        });
}

pub fn band_color(band: CorrelationBand) -> Color32 {
    match band {
        CorrelationBand::Diagonal => Color32::from_rgb(51, 65, 85),
        CorrelationBand::StrongPositive => Color32::from_rgb(185, 28, 28),
        CorrelationBand::Positive => Color32::from_rgb(239, 68, 68),
        CorrelationBand::WeakPositive => Color32::from_rgb(252, 165, 165),
        CorrelationBand::Neutral => Color32::from_rgb(100, 116, 139),
        CorrelationBand::WeakNegative => Color32::from_rgb(134, 239, 172),
        CorrelationBand::Negative => Color32::from_rgb(34, 197, 94),
        CorrelationBand::StrongNegative => Color32::from_rgb(21, 128, 61),
    }
}

fn band_text(band: CorrelationBand) -> &'static str {
    match band {
        CorrelationBand::Diagonal => "mesmo ativo",
        CorrelationBand::StrongPositive => "correlação forte",
        CorrelationBand::Positive => "correlação moderada",
        CorrelationBand::WeakPositive => "correlação fraca",
        CorrelationBand::Neutral => "sem correlação",
        CorrelationBand::WeakNegative => "inversa fraca",
        CorrelationBand::Negative => "inversa moderada",
        CorrelationBand::StrongNegative => "inversa forte (proteção)",
    }
}

pub fn correlation_heatmap(ui: &mut Ui, data: &CorrelationData) {
    if !data.is_success() || !data.is_sufficient() {
        ui.label("Dados insuficientes para calcular correlações (mínimo de 2 ativos).");
        return;
    }
    let grid = data.grid();
    egui::ScrollArea::both().show(ui, |ui| {
        egui::Grid::new("correlation").spacing([2.0, 2.0]).show(ui, |ui| {
            ui.label("");
            for l in &data.labels {
                ui.label(RichText::new(l).small().strong());
            }
            ui.end_row();
            for (i, row) in grid.iter().enumerate() {
                ui.label(RichText::new(&data.labels[i]).small().strong());
                for (j, cell) in row.iter().enumerate() {
                    match cell {
                        Some(value) => {
                            let band = CorrelationBand::of(*value, i == j);
                            ui.label(
                                RichText::new(format!(" {} ", format_num(*value, 2)))
                                    .monospace()
                                    .color(Color32::WHITE)
                                    .background_color(band_color(band)),
                            )
                            .on_hover_text(format!(
                                "{} × {}: {} ({})",
                                data.labels[i],
                                data.labels[j],
                                format_num(*value, 2),
                                band_text(band)
                            ));
                        }
                        None => {
                            ui.label(" - ");
                        }
                    }
                }
                ui.end_row();
            }
        });
    });
}

#[test]
fn test_history_charts() {
    let points = vec![
        HistoryPoint {
            date: "2024-05-01".to_string(),
            patrimonio: 1000.0,
            investido: 900.0,
        },
        HistoryPoint {
            date: "ontem".to_string(),
            patrimonio: 1100.0,
            investido: 950.0,
        },
    ];
    let (charts, labels) = history_charts(&points);
    assert_eq!(labels, vec!["01/05/2024".to_string(), "ontem".to_string()]);
    assert_eq!(charts[0].name(), "Patrimônio");
    assert_eq!(charts[1].values, vec![900.0, 950.0]);
    assert_eq!(label_at(&labels, 1.0), "ontem");
    assert_eq!(label_at(&labels, 0.5), "");
    assert_eq!(label_at(&labels, 7.0), "");
}

#[test]
fn test_montecarlo_charts() {
    let data: MonteCarloData = serde_json::from_str(
        r#"{"status": "Sucesso", "volatilidade_anual": "18.2%",
            "projecao": {"pior_caso": [1, 2], "medio": [1, 3, 4], "melhor_caso": [1, 5, 9]}}"#,
    )
    .unwrap();
    let (charts, labels) = montecarlo_charts(&data);
    assert_eq!(labels.len(), 3);
    assert_eq!(labels[2], "Mês 2");
    assert_eq!(
        charts.iter().map(|c| c.name()).collect::<Vec<_>>(),
        vec!["Pessimista", "Realista", "Otimista"]
    );
}
