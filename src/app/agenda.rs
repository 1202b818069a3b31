use egui::{Color32, RichText, Ui};
use std::str::FromStr;

use super::{heading, heading2, AssetFlowApp};
use crate::{
    date::{group_by_month, Date, MonthKey},
    model::Evento,
};

const STATEMENT_GROUPS: [(&str, &str); 2] = [
    ("A RECEBER", "Provisionados (Aguardando)"),
    ("PAGO", "Liquidados (Em Conta)"),
];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(super) enum AgendaView {
    #[default]
    Upcoming,
    Statement,
}

pub struct MonthGroup<'a> {
    pub month: MonthKey,
    pub total: f64,
    pub events: Vec<&'a Evento>,
}

/// Upcoming events per `YYYY-MM`, oldest month first.
pub fn months(events: &[Evento]) -> Vec<MonthGroup<'_>> {
    group_by_month(events, |e| e.date.as_str())
        .into_iter()
        .map(|(month, events)| MonthGroup {
            month,
            total: events.iter().map(|e| e.total).sum(),
            events,
        })
        .collect()
}

fn br_date(d: &str) -> String {
    Date::from_str(d)
        .map(|d| d.to_br_string())
        .unwrap_or_else(|_| d.to_string())
}

impl AssetFlowApp<'_> {
    pub(super) fn agenda_screen(&mut self, ui: &mut Ui) {
        heading(ui, "Agenda de proventos");
        ui.horizontal(|ui| {
            ui.selectable_value(&mut self.agenda_view, AgendaView::Upcoming, "📅 Agenda Futura");
            ui.selectable_value(&mut self.agenda_view, AgendaView::Statement, "🧾 Extrato Real");
        });
        ui.separator();
        let source = match self.agenda_view {
            AgendaView::Upcoming => &self.calendar,
            AgendaView::Statement => &self.dividends,
        };
        match source {
            None => {
                ui.spinner();
            }
            Some(Err(e)) => {
                ui.label(format!("Não foi possível carregar a agenda: {e}"));
            }
            Some(Ok(events)) if events.is_empty() => {
                ui.label("Nenhum provento encontrado.");
            }
            Some(Ok(events)) => match self.agenda_view {
                AgendaView::Upcoming => self.upcoming(ui, events),
                AgendaView::Statement => self.statement(ui, events),
            },
        }
    }

    fn upcoming(&self, ui: &mut Ui, events: &[Evento]) {
        for group in months(events) {
            ui.horizontal(|ui| {
                heading2(ui, &group.month.long_name());
                ui.label(
                    RichText::new(format!("+ {}", self.money(group.total)))
                        .strong()
                        .color(Color32::from_rgb(52, 211, 153)),
                );
            });
            egui::Grid::new(format!("month {}", group.month))
                .striped(true)
                .num_columns(4)
                .show(ui, |ui| {
                    for e in group.events {
                        ui.label(RichText::new(&e.ticker).strong());
                        ui.label(br_date(&e.date));
                        ui.label(self.money(e.total));
                        let marker = if e.is_estimate { "🕑" } else { "✔" };
                        ui.label(format!("{marker} {}", e.status));
                        ui.end_row();
                    }
                });
            ui.add_space(10.0);
        }
    }

    fn statement(&self, ui: &mut Ui, events: &[Evento]) {
        for (status, title) in STATEMENT_GROUPS {
            let items = events.iter().filter(|e| e.status == status).collect::<Vec<_>>();
            if items.is_empty() {
                continue;
            }
            heading2(ui, title);
            egui::Grid::new(status).striped(true).num_columns(3).show(ui, |ui| {
                for e in items {
                    ui.label(RichText::new(&e.ticker).strong());
                    ui.label(format!("Data-Com: {}", br_date(&e.date)));
                    ui.label(self.money(e.total));
                    ui.end_row();
                }
            });
            ui.add_space(10.0);
        }
        let total: f64 = events
            .iter()
            .filter(|e| e.status == "PAGO")
            .map(|e| e.total)
            .sum();
        if total > 0.0 {
            ui.label(format!("Total recebido: {}", self.money(total)));
        }
    }
}

#[cfg(test)]
fn evento(ticker: &str, date: &str, total: f64) -> Evento {
    Evento {
        ticker: ticker.to_string(),
        date: date.to_string(),
        total,
        ..Default::default()
    }
}

#[test]
fn test_months() {
    let events = vec![
        evento("MXRF11", "2024-07-15", 12.5),
        evento("ITSA4", "2024-06-01", 3.0),
        evento("HGLG11", "2024-07-01", 20.0),
        evento("BROKEN", "soon", 99.0),
    ];
    let groups = months(&events);
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].month.to_string(), "2024-06");
    assert_eq!(groups[0].total, 3.0);
    assert_eq!(groups[1].total, 32.5);
    assert_eq!(groups[1].events.len(), 2);
    assert_eq!(br_date("2024-07-15"), "15/07/2024");
    assert_eq!(br_date("soon"), "soon");
}
