use crate::aflerr;
use crate::allocation::{simulate, AllocationPlan};
use crate::core_types::{AflError, AflResult};
use crate::format::money;
use crate::io::{decode_json, default_api_base, session_from_set_cookie, Endpoint};
use crate::model::{
    Alert, AssetDelete, CorrelationData, DashboardData, Evento, HistoryPoint, LoginReply,
    MonteCarloData, NewsItem, WriteReply, CATEGORIES,
};
use egui::{Context, Response, RichText, Ui, ViewportCommand};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
mod agenda;
mod charts;
mod dashboard;
mod modals;
mod ui_state_types;

use self::agenda::AgendaView;
use self::ui_state_types::{
    AddAssetForm, EditAssetForm, LoginForm, RestMethod, RestRequest, SimulatorInput,
};

const ALERT_POLL_SECS: u64 = 60;

const REQ_DASHBOARD: &str = "dashboard";
const REQ_ADD: &str = "add_asset";
const REQ_UPDATE: &str = "update_asset";
const REQ_DELETE: &str = "delete_asset";

fn heading2(ui: &mut Ui, s: &str) -> Response {
    ui.heading(RichText::new(s).strong().size(18.0))
}

fn heading(ui: &mut Ui, s: &str) -> Response {
    ui.heading(RichText::new(s).strong().size(30.0))
}

#[cfg(target_arch = "wasm32")]
fn current_path() -> Option<String> {
    web_sys::window()?.location().pathname().ok()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
enum Screen {
    Login,
    #[default]
    Dashboard,
    Agenda,
}
impl Screen {
    #[cfg(target_arch = "wasm32")]
    fn from_path(path: &str) -> Self {
        match path.trim_end_matches('/') {
            "/login" => Screen::Login,
            "/agenda" => Screen::Agenda,
            _ => Screen::Dashboard,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
enum Tab {
    #[default]
    Resumo,
    Evolucao,
    /// index into `CATEGORIES`
    Category(usize),
    Radar,
    Correlacao,
}
impl Tab {
    fn all() -> Vec<Tab> {
        [Tab::Resumo, Tab::Evolucao]
            .into_iter()
            .chain((0..CATEGORIES.len()).map(Tab::Category))
            .chain([Tab::Radar, Tab::Correlacao])
            .collect()
    }
    fn label(&self) -> &'static str {
        match self {
            Tab::Resumo => "Resumo",
            Tab::Evolucao => "Evolução",
            Tab::Category(i) => CATEGORIES.get(*i).copied().unwrap_or("?"),
            Tab::Radar => "Radar",
            Tab::Correlacao => "Correlação",
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
enum Modal {
    #[default]
    None,
    Add(AddAssetForm),
    Edit(EditAssetForm),
    ConfirmDelete { id: i64, ticker: String },
    Allocation,
}

#[derive(Debug, Default)]
struct AlertsState {
    items: Vec<Alert>,
    offline: bool,
    last_poll: Option<f64>,
    open: bool,
}

#[derive(Debug, Default)]
struct NewsPanel {
    ticker: String,
    items: Option<AflResult<Vec<NewsItem>>>,
}

/// We derive Deserialize/Serialize so we can persist app state on shutdown.
#[derive(Deserialize, Serialize, Default)]
#[serde(default)] // if we add new fields, give them default values when deserializing old state
pub struct AssetFlowApp<'a> {
    #[serde(skip)]
    api_base: String,
    #[serde(skip)]
    dashboard_request: RestRequest<'a>,
    #[serde(skip)]
    history_request: RestRequest<'a>,
    #[serde(skip)]
    montecarlo_request: RestRequest<'a>,
    #[serde(skip)]
    correlation_request: RestRequest<'a>,
    #[serde(skip)]
    alerts_request: RestRequest<'a>,
    #[serde(skip)]
    calendar_request: RestRequest<'a>,
    #[serde(skip)]
    dividends_request: RestRequest<'a>,
    #[serde(skip)]
    news_request: RestRequest<'a>,
    #[serde(skip)]
    write_request: RestRequest<'a>,
    #[serde(skip)]
    login_request: RestRequest<'a>,
    #[serde(skip)]
    logout_request: RestRequest<'a>,
    #[serde(skip)]
    pending_write: Option<&'static str>,
    #[serde(skip)]
    dashboard: Option<AflResult<DashboardData>>,
    #[serde(skip)]
    history: Option<AflResult<Vec<HistoryPoint>>>,
    #[serde(skip)]
    montecarlo: Option<AflResult<MonteCarloData>>,
    #[serde(skip)]
    correlation: Option<AflResult<CorrelationData>>,
    #[serde(skip)]
    calendar: Option<AflResult<Vec<Evento>>>,
    #[serde(skip)]
    dividends: Option<AflResult<Vec<Evento>>>,
    #[serde(skip)]
    alerts: AlertsState,
    #[serde(skip)]
    news: Option<NewsPanel>,
    #[serde(skip)]
    modal: Modal,
    #[serde(skip)]
    plan: Option<AflResult<AllocationPlan>>,
    #[serde(skip)]
    error_dialog: Option<String>,
    #[serde(skip)]
    status_msg: Option<String>,
    #[serde(skip)]
    login: LoginForm,
    #[serde(skip)]
    screen: Screen,
    #[serde(skip)]
    agenda_view: AgendaView,
    tab: Tab,
    privacy: bool,
    /// Session cookie for native builds; browsers keep it themselves.
    session: Option<String>,
    simulator: SimulatorInput,
}

impl<'a> AssetFlowApp<'a> {
    /// Called once before the first frame.
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        // Note that you must enable the `persistence` feature for this to work.
        let mut app: Self = if let Some(storage) = cc.storage {
            eframe::get_value(storage, eframe::APP_KEY).unwrap_or_default()
        } else {
            Self::default()
        };
        app.api_base = default_api_base();
        #[cfg(target_arch = "wasm32")]
        {
            if let Some(path) = current_path() {
                app.screen = Screen::from_path(&path);
            }
        }
        tracing::info!(api_base = %app.api_base, "starting AssetFlow");
        app
    }

    fn trigger(
        request: &mut RestRequest<'a>,
        base: &str,
        session: Option<&str>,
        endpoint: Endpoint,
        name: &'a str,
        method: RestMethod,
        ctx: &Context,
    ) {
        request.trigger(
            &endpoint.url(base),
            name,
            method,
            session,
            Some(ctx.clone()),
        );
    }

    fn get(&mut self, which: Which, ctx: &Context) {
        let (request, endpoint, name) = match which {
            Which::Dashboard { force } => (
                &mut self.dashboard_request,
                Endpoint::Index { force },
                REQ_DASHBOARD,
            ),
            Which::History => (&mut self.history_request, Endpoint::History, "history"),
            Which::MonteCarlo => (
                &mut self.montecarlo_request,
                Endpoint::Simulation,
                "simulation",
            ),
            Which::Correlation => (
                &mut self.correlation_request,
                Endpoint::Correlation,
                "correlation",
            ),
            Which::Alerts => (&mut self.alerts_request, Endpoint::Alerts, "alerts"),
            Which::Calendar => (&mut self.calendar_request, Endpoint::Calendar, "calendar"),
            Which::Dividends => (
                &mut self.dividends_request,
                Endpoint::DividendHistory,
                "dividends",
            ),
            Which::News(ticker) => (&mut self.news_request, Endpoint::News(ticker), "news"),
        };
        Self::trigger(
            request,
            &self.api_base,
            self.session.as_deref(),
            endpoint,
            name,
            RestMethod::Get,
            ctx,
        );
    }

    fn post<T: Serialize>(
        &mut self,
        endpoint: Endpoint,
        name: &'static str,
        payload: &T,
        ctx: &Context,
    ) {
        match RestMethod::json(payload) {
            Ok(method) => {
                let request = if name == "login" {
                    &mut self.login_request
                } else {
                    self.pending_write = Some(name);
                    &mut self.write_request
                };
                Self::trigger(
                    request,
                    &self.api_base,
                    self.session.as_deref(),
                    endpoint,
                    name,
                    method,
                    ctx,
                );
            }
            Err(e) => self.error_dialog = Some(e.to_string()),
        }
    }

    fn refresh(&mut self, force: bool, ctx: &Context) {
        if !self.dashboard_request.is_in_progress() {
            self.get(Which::Dashboard { force }, ctx);
            self.get(Which::History, ctx);
            self.get(Which::MonteCarlo, ctx);
            self.correlation = None;
        }
    }

    fn require_login(&mut self) {
        if self.screen != Screen::Login {
            tracing::info!("session missing or expired");
        }
        self.session = None;
        self.screen = Screen::Login;
    }

    /// Turns a finished fetch into data; a 401 sends us to the login screen.
    fn decode<T: DeserializeOwned>(&mut self, result: ehttp::Result<ehttp::Response>) -> AflResult<T> {
        match result {
            Ok(resp) if resp.status == 401 => {
                self.require_login();
                Err(aflerr!("Sessão expirada, faça login novamente."))
            }
            Ok(resp) => decode_json(&resp),
            Err(e) => Err(aflerr!("Não foi possível conectar ao servidor: {e}")),
        }
    }

    fn check_requests(&mut self, ctx: &Context) {
        if let Some(result) = self.dashboard_request.poll() {
            let dashboard = self.decode::<DashboardData>(result).and_then(|d| {
                if d.is_error() {
                    Err(AflError::new(&d.error_message()))
                } else {
                    Ok(d)
                }
            });
            match dashboard {
                // keep showing the last good snapshot
                Err(e) if matches!(self.dashboard, Some(Ok(_))) => {
                    tracing::warn!("dashboard refresh failed: {e}");
                    self.status_msg = Some(format!("Falha ao atualizar, exibindo últimos dados: {e}"));
                }
                dashboard => {
                    match &dashboard {
                        Ok(_) => self.status_msg = None,
                        Err(e) => tracing::warn!("dashboard: {e}"),
                    }
                    self.dashboard = Some(dashboard);
                }
            }
        }
        if let Some(result) = self.history_request.poll() {
            self.history = Some(self.decode(result));
        }
        if let Some(result) = self.montecarlo_request.poll() {
            self.montecarlo = Some(self.decode(result));
        }
        if let Some(result) = self.correlation_request.poll() {
            self.correlation = Some(self.decode(result));
        }
        if let Some(result) = self.calendar_request.poll() {
            self.calendar = Some(self.decode(result));
        }
        if let Some(result) = self.dividends_request.poll() {
            self.dividends = Some(self.decode(result));
        }
        if let Some(result) = self.alerts_request.poll() {
            match self.decode::<Vec<Alert>>(result) {
                Ok(items) => {
                    self.alerts.items = items;
                    self.alerts.offline = false;
                }
                Err(e) => {
                    tracing::debug!("alerts offline: {e}");
                    self.alerts.items.clear();
                    self.alerts.offline = true;
                }
            }
        }
        if let Some(result) = self.news_request.poll() {
            let items = self.decode(result);
            if let Some(panel) = &mut self.news {
                panel.items = Some(items);
            }
        }
        if let Some(result) = self.login_request.poll() {
            self.check_login(result, ctx);
        }
        if let Some(result) = self.write_request.poll() {
            self.check_write(result, ctx);
        }
        if let Some(Err(e)) = self.logout_request.poll() {
            tracing::warn!("logout: {e}");
        }
    }

    fn check_login(&mut self, result: ehttp::Result<ehttp::Response>, ctx: &Context) {
        match result {
            Ok(resp) => {
                let reply: LoginReply = serde_json::from_str(resp.text().unwrap_or(""))
                    .unwrap_or_default();
                if resp.ok && reply.success {
                    self.session = resp.headers.get("set-cookie").and_then(session_from_set_cookie);
                    self.login = LoginForm::default();
                    self.screen = Screen::Dashboard;
                    self.refresh(false, ctx);
                } else {
                    self.login.error = Some(
                        reply
                            .message
                            .unwrap_or_else(|| "Senha incorreta".to_string()),
                    );
                }
            }
            Err(e) => self.login.error = Some(format!("Erro de conexão: {e}")),
        }
    }

    fn check_write(&mut self, result: ehttp::Result<ehttp::Response>, ctx: &Context) {
        let name = self.pending_write.take().unwrap_or(REQ_UPDATE);
        match self.decode::<WriteReply>(result) {
            // only the add route guarantees a status field
            Ok(reply) if reply.is_success() || (name != REQ_ADD && reply.status != "Erro") => {
                tracing::info!(name, "write succeeded");
                self.modal = Modal::None;
                self.refresh(true, ctx);
            }
            Ok(reply) => {
                self.error_dialog = Some(format!("Erro ao salvar: {}", reply.msg));
            }
            Err(e) => {
                self.error_dialog = Some(format!("Erro ao salvar: {e}"));
            }
        }
    }

    fn poll_alerts(&mut self, ctx: &Context) {
        let now = ctx.input(|i| i.time);
        let due = self
            .alerts
            .last_poll
            .map_or(true, |t| now - t >= ALERT_POLL_SECS as f64);
        if due && !self.alerts_request.is_in_progress() {
            self.alerts.last_poll = Some(now);
            self.get(Which::Alerts, ctx);
        }
        ctx.request_repaint_after(Duration::from_secs(ALERT_POLL_SECS));
    }

    fn open_edit(&mut self, ticker: &str) {
        if let Some(Ok(dashboard)) = &self.dashboard {
            if let Some(asset) = dashboard.asset_by_ticker(ticker) {
                self.modal = Modal::Edit(EditAssetForm::from_asset(asset, &dashboard.ativos));
            }
        }
    }

    fn open_alert_fix(&mut self, id: i64) {
        if let Some(Ok(dashboard)) = &self.dashboard {
            if let Some(asset) = dashboard.asset_by_id(id) {
                self.modal = Modal::Edit(EditAssetForm::from_asset(asset, &dashboard.ativos));
            }
        }
    }

    /// Expires the gateway cookie too, browsers cannot drop an `HttpOnly` one.
    fn logout(&mut self, ctx: &Context) {
        Self::trigger(
            &mut self.logout_request,
            &self.api_base,
            self.session.as_deref(),
            Endpoint::Logout,
            "logout",
            RestMethod::Post(Vec::new()),
            ctx,
        );
        self.dashboard = None;
        self.modal = Modal::None;
        self.require_login();
    }

    fn open_news(&mut self, ticker: &str, ctx: &Context) {
        self.news = Some(NewsPanel {
            ticker: ticker.to_string(),
            items: None,
        });
        self.get(Which::News(ticker.to_string()), ctx);
    }

    fn run_simulation(&mut self) {
        let plan = self.simulator.parse().and_then(|amount| match &self.dashboard {
            Some(Ok(d)) => simulate(amount, &d.ativos),
            _ => Err(aflerr!("Carteira ainda não carregada")),
        });
        self.plan = Some(plan);
    }

    fn delete(&mut self, id: i64, ctx: &Context) {
        self.post(Endpoint::DeleteAsset, REQ_DELETE, &AssetDelete { id }, ctx);
    }

    fn money(&self, x: f64) -> String {
        money(x, self.privacy)
    }

    fn login_screen(&mut self, ui: &mut Ui, ctx: &Context) {
        ui.vertical_centered(|ui| {
            ui.add_space(80.0);
            heading(ui, "AssetFlow");
            ui.label("Acesso restrito");
            ui.add_space(20.0);
            let edit = ui.add(
                egui::TextEdit::singleline(&mut self.login.password)
                    .password(true)
                    .hint_text("Senha")
                    .desired_width(220.0),
            );
            let enter = edit.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            if let Some(e) = &self.login.error {
                ui.colored_label(egui::Color32::LIGHT_RED, e);
            }
            let busy = self.login_request.is_in_progress();
            if busy {
                ui.spinner();
            }
            if (ui.add_enabled(!busy, egui::Button::new("Entrar")).clicked() || enter) && !busy {
                self.login.error = None;
                let request = self.login.request();
                self.post(Endpoint::Login, "login", &request, ctx);
            }
        });
    }

    fn header(&mut self, ui: &mut Ui, ctx: &Context) {
        ui.horizontal_wrapped(|ui| {
            heading(ui, "AssetFlow");
            ui.separator();
            let (total, renda) = match &self.dashboard {
                Some(Ok(d)) => (Some(d.resumo.total), d.resumo.renda_mensal),
                _ => (None, 0.0),
            };
            ui.vertical(|ui| {
                ui.label("Patrimônio total");
                ui.label(
                    RichText::new(total.map_or_else(|| "...".to_string(), |t| self.money(t)))
                        .strong()
                        .size(22.0),
                );
                if renda > 0.0 {
                    ui.label(format!("Renda mensal est. {}", self.money(renda)));
                }
            });
            ui.separator();
            let eye = if self.privacy { "🙈" } else { "👁" };
            if ui.button(eye).on_hover_text("Modo privacidade").clicked() {
                self.privacy = !self.privacy;
            }
            let alerts_label = if self.alerts.offline {
                "🔔 offline".to_string()
            } else {
                format!("🔔 {}", self.alerts.items.len())
            };
            if ui.button(alerts_label).clicked() {
                self.alerts.open = !self.alerts.open;
                if self.alerts.open {
                    self.alerts.last_poll = Some(ctx.input(|i| i.time));
                    self.get(Which::Alerts, ctx);
                }
            }
            let refreshing = self.dashboard_request.is_in_progress();
            if ui
                .add_enabled(!refreshing, egui::Button::new("⟳"))
                .on_hover_text("Recarregar dados")
                .clicked()
            {
                self.refresh(true, ctx);
            }
            if refreshing {
                ui.spinner();
            }
            if ui.button("➕ Ativo").clicked() {
                self.modal = Modal::Add(AddAssetForm::default());
            }
            if ui.button("🧠 Aporte inteligente").clicked() {
                self.plan = None;
                self.modal = Modal::Allocation;
            }
            let (target, label) = match self.screen {
                Screen::Agenda => (Screen::Dashboard, "📊 Carteira"),
                _ => (Screen::Agenda, "📅 Agenda"),
            };
            if ui.button(label).clicked() {
                self.screen = target;
                if target == Screen::Agenda {
                    self.get(Which::Calendar, ctx);
                    self.get(Which::Dividends, ctx);
                }
            }
        });
    }
}

enum Which {
    Dashboard { force: bool },
    History,
    MonteCarlo,
    Correlation,
    Alerts,
    Calendar,
    Dividends,
    News(String),
}

impl eframe::App for AssetFlowApp<'_> {
    /// Called by the frame work to save state before shutdown.
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        eframe::set_value(storage, eframe::APP_KEY, self);
    }

    /// Called each time the UI needs repainting, which may be many times per second.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.check_requests(ctx);

        if self.screen != Screen::Login {
            if self.dashboard.is_none() && !self.dashboard_request.is_in_progress() {
                self.refresh(false, ctx);
            }
            if self.screen == Screen::Agenda
                && self.calendar.is_none()
                && !self.calendar_request.is_in_progress()
            {
                self.get(Which::Calendar, ctx);
                self.get(Which::Dividends, ctx);
            }
            self.poll_alerts(ctx);
        }

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("Menu", |ui| {
                    if self.screen != Screen::Login && ui.button("Sair da sessão").clicked() {
                        self.logout(ctx);
                        ui.close_menu();
                    }
                    #[cfg(not(target_arch = "wasm32"))]
                    {
                        if ui.button("Fechar").clicked() {
                            ctx.send_viewport_cmd(ViewportCommand::Close);
                        }
                    }
                });
                ui.add_space(16.0);
                egui::widgets::global_theme_preference_buttons(ui);
            });
            if self.screen != Screen::Login {
                self.header(ui, ctx);
            }
        });

        if self.screen == Screen::Dashboard {
            self.news_panel(ctx);
        }

        egui::CentralPanel::default().show(ctx, |ui| match self.screen {
            Screen::Login => self.login_screen(ui, ctx),
            Screen::Dashboard => {
                egui::ScrollArea::vertical().show(ui, |ui| self.dashboard_screen(ui, ctx));
            }
            Screen::Agenda => {
                egui::ScrollArea::vertical().show(ui, |ui| self.agenda_screen(ui));
            }
        });

        if self.screen != Screen::Login {
            self.alerts_window(ctx);
            self.modal_windows(ctx);
        }
        self.error_window(ctx);
        if let Some(status) = &self.status_msg {
            egui::TopBottomPanel::bottom("status").show(ctx, |ui| ui.label(status));
        }
    }
}

#[cfg(test)]
fn test_app() -> AssetFlowApp<'static> {
    AssetFlowApp {
        api_base: "http://localhost:3000".to_string(),
        ..Default::default()
    }
}

#[cfg(test)]
fn response(status: u16, body: &str, set_cookie: Option<&str>) -> ehttp::Response {
    let mut headers = ehttp::Headers::default();
    if let Some(c) = set_cookie {
        headers.insert("set-cookie", c);
    }
    ehttp::Response {
        url: "http://localhost:3000/api".to_string(),
        ok: (200..300).contains(&status),
        status,
        status_text: "".to_string(),
        headers,
        bytes: body.as_bytes().to_vec(),
    }
}

#[test]
fn test_tabs() {
    let tabs = Tab::all();
    assert_eq!(tabs.len(), 4 + CATEGORIES.len());
    assert_eq!(tabs[0].label(), "Resumo");
    assert_eq!(tabs[2].label(), "Ação");
    assert_eq!(tabs.last().map(|t| t.label()), Some("Correlação"));
}

#[test]
fn test_unauthorized_sends_to_login() {
    let mut app = test_app();
    app.session = Some("assetflow_session=authenticated".to_string());
    let res: AflResult<DashboardData> = app.decode(Ok(response(401, "{}", None)));
    assert!(res.is_err());
    assert_eq!(app.screen, Screen::Login);
    assert_eq!(app.session, None);

    let mut app = test_app();
    let res: AflResult<Vec<Alert>> = app.decode(Err("connection refused".to_string()));
    assert!(res.unwrap_err().msg.contains("connection refused"));
    assert_eq!(app.screen, Screen::Dashboard);
}

#[test]
fn test_login_reply() {
    let ctx = Context::default();
    let mut app = test_app();
    app.screen = Screen::Login;
    app.check_login(
        Ok(response(
            401,
            r#"{"success":false,"message":"Senha incorreta"}"#,
            None,
        )),
        &ctx,
    );
    assert_eq!(app.screen, Screen::Login);
    assert_eq!(app.login.error.as_deref(), Some("Senha incorreta"));
}

#[test]
fn test_login_success_keeps_session() {
    let ctx = Context::default();
    let mut app = test_app();
    app.screen = Screen::Login;
    app.login.password = "admin".to_string();
    app.check_login(
        Ok(response(
            200,
            r#"{"success":true}"#,
            Some("assetflow_session=authenticated; HttpOnly; Path=/; Max-Age=604800"),
        )),
        &ctx,
    );
    assert_eq!(app.screen, Screen::Dashboard);
    assert_eq!(
        app.session.as_deref(),
        Some("assetflow_session=authenticated")
    );
    assert!(app.login.password.is_empty());
    assert!(app.dashboard_request.is_in_progress());
}

#[test]
fn test_simulation_needs_dashboard() {
    let mut app = test_app();
    app.simulator.amount = "1.000,00".to_string();
    app.run_simulation();
    assert!(matches!(app.plan, Some(Err(_))));

    app.dashboard = Some(Ok(DashboardData {
        ativos: vec![crate::model::Asset {
            ticker: "MXRF11".to_string(),
            preco_atual: 10.0,
            falta_comprar: 200.0,
            ..Default::default()
        }],
        ..Default::default()
    }));
    app.run_simulation();
    let plan = app.plan.unwrap().unwrap();
    assert_eq!(plan.purchases.len(), 1);
    assert_eq!(plan.purchases[0].quantity, 20);
}

#[cfg(test)]
fn backend_dashboard() -> DashboardData {
    // rows of /api/index carry no id
    serde_json::from_str(
        r#"{"status": "Sucesso", "ativos": [
            {"ticker": "BBAS3", "tipo": "Ação", "qtd": 100, "pm": 25.0, "meta": 40},
            {"ticker": "WEGE3", "tipo": "Ação", "qtd": 10, "pm": 35.0, "meta": 20}
        ]}"#,
    )
    .unwrap()
}

#[test]
fn test_edit_opens_clicked_row() {
    let mut app = test_app();
    app.dashboard = Some(Ok(backend_dashboard()));
    app.open_edit("WEGE3");
    match &app.modal {
        Modal::Edit(form) => {
            assert_eq!(form.ticker, "WEGE3");
            assert_eq!(form.max_meta, 60.0);
        }
        other => panic!("unexpected modal {other:?}"),
    }
    app.modal = Modal::None;
    app.open_edit("ITSA4");
    assert_eq!(app.modal, Modal::None);
}

#[test]
fn test_alert_fix_opens_by_id() {
    let mut app = test_app();
    let mut dashboard = backend_dashboard();
    dashboard.ativos[1].id = 7;
    app.dashboard = Some(Ok(dashboard));
    app.open_alert_fix(7);
    assert!(matches!(&app.modal, Modal::Edit(form) if form.ticker == "WEGE3"));
}

#[cfg(test)]
fn write_reply(app: &mut AssetFlowApp<'static>, name: &'static str, body: &str) {
    let ctx = Context::default();
    app.pending_write = Some(name);
    app.check_write(Ok(response(200, body, None)), &ctx);
}

#[test]
fn test_add_needs_success_status() {
    let mut app = test_app();
    app.modal = Modal::Add(AddAssetForm::default());
    write_reply(&mut app, REQ_ADD, r#"{"status": "Aviso", "msg": "Ticker não encontrado"}"#);
    assert!(matches!(app.modal, Modal::Add(_)));
    assert!(app
        .error_dialog
        .as_deref()
        .is_some_and(|e| e.contains("Ticker não encontrado")));
    assert!(!app.dashboard_request.is_in_progress());

    app.error_dialog = None;
    write_reply(&mut app, REQ_ADD, r#"{"status": "Sucesso", "msg": "ok"}"#);
    assert_eq!(app.modal, Modal::None);
    assert_eq!(app.error_dialog, None);
    assert!(app.dashboard_request.is_in_progress());
}

#[test]
fn test_update_and_delete_fail_only_on_error() {
    let mut app = test_app();
    app.dashboard = Some(Ok(backend_dashboard()));
    app.open_edit("BBAS3");
    write_reply(&mut app, REQ_UPDATE, r#"{"msg": "Atualizado"}"#);
    assert_eq!(app.modal, Modal::None);
    assert_eq!(app.error_dialog, None);
    assert!(app.dashboard_request.is_in_progress());

    let mut app = test_app();
    app.modal = Modal::ConfirmDelete {
        id: 3,
        ticker: "BBAS3".to_string(),
    };
    write_reply(&mut app, REQ_DELETE, r#"{"status": "Erro", "msg": "não encontrado"}"#);
    assert!(matches!(app.modal, Modal::ConfirmDelete { id: 3, .. }));
    assert!(app
        .error_dialog
        .as_deref()
        .is_some_and(|e| e.contains("não encontrado")));
    assert!(!app.dashboard_request.is_in_progress());
}

#[test]
fn test_failed_refresh_keeps_last_dashboard() {
    let ctx = Context::default();
    let mut app = test_app();
    app.dashboard = Some(Ok(backend_dashboard()));
    app.dashboard_request.state = ui_state_types::RestRequestState::Done((
        REQ_DASHBOARD,
        Ok(response(500, "Internal Server Error", None)),
    ));
    app.check_requests(&ctx);
    assert!(matches!(&app.dashboard, Some(Ok(d)) if d.ativos.len() == 2));
    assert!(app.status_msg.as_deref().is_some_and(|m| m.contains("500")));

    let mut app = test_app();
    app.dashboard_request.state = ui_state_types::RestRequestState::Done((
        REQ_DASHBOARD,
        Ok(response(500, "Internal Server Error", None)),
    ));
    app.check_requests(&ctx);
    assert!(matches!(app.dashboard, Some(Err(_))));
}

#[test]
fn test_logout_expires_session() {
    let ctx = Context::default();
    let mut app = test_app();
    app.session = Some("assetflow_session=authenticated".to_string());
    app.dashboard = Some(Ok(backend_dashboard()));
    app.logout(&ctx);
    assert_eq!(app.screen, Screen::Login);
    assert_eq!(app.session, None);
    assert!(app.dashboard.is_none());
    assert!(app.logout_request.is_in_progress());
}
