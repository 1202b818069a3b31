//! View-models mirrored from the backend's JSON. The backend owns these shapes,
//! so every struct deserializes leniently and missing fields fall back to defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

pub const CATEGORIES: [&str; 6] = ["Ação", "FII", "Internacional", "Renda Fixa", "Reserva", "Cripto"];

/// Macro allocation targets per category in percent.
pub const CATEGORY_TARGETS: [(&str, f64); 6] = [
    ("Ação", 25.0),
    ("FII", 35.0),
    ("Internacional", 25.0),
    ("Renda Fixa", 10.0),
    ("Cripto", 5.0),
    ("Reserva", 0.0),
];

pub fn category_target(category: &str) -> f64 {
    CATEGORY_TARGETS
        .iter()
        .find(|(c, _)| *c == category)
        .map(|(_, t)| *t)
        .unwrap_or(0.0)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetStatus {
    CompraForte,
    Comprar,
    Aguardar,
    Manter,
    #[default]
    #[serde(other)]
    Neutro,
}
impl AssetStatus {
    /// MANTER and NEUTRO carry no actionable badge.
    pub fn has_badge(&self) -> bool {
        !matches!(self, AssetStatus::Manter | AssetStatus::Neutro)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Asset {
    pub id: i64,
    pub ticker: String,
    pub tipo: String,
    pub qtd: f64,
    pub pm: f64,
    pub meta: f64,
    pub preco_atual: f64,
    pub min_6m: f64,

    pub total_atual: f64,
    pub total_investido: f64,
    pub lucro_valor: f64,
    pub lucro_pct: f64,
    pub pct_na_categoria: f64,
    pub falta_comprar: f64,

    pub recomendacao: String,
    pub status: AssetStatus,
    pub score: f64,
    pub motivo: String,

    pub vi_graham: Option<f64>,
    pub mg_graham: Option<f64>,
    pub magic_number: Option<f64>,
    pub renda_mensal_est: Option<f64>,

    pub manual_dy: Option<f64>,
    pub manual_lpa: Option<f64>,
    pub manual_vpa: Option<f64>,
}
impl Asset {
    pub fn is_overweight(&self) -> bool {
        self.pct_na_categoria > self.meta
    }

    /// Progress towards the target in percent, capped at 100.
    pub fn target_progress(&self) -> f64 {
        if self.meta > 0.0 {
            (self.pct_na_categoria / self.meta * 100.0).min(100.0)
        } else {
            0.0
        }
    }

    pub fn reached_magic_number(&self) -> bool {
        matches!(self.magic_number, Some(m) if m > 0.0 && self.qtd >= m)
    }

    /// Assets the backend cannot quote need a manually entered price.
    pub fn needs_manual_price(&self) -> bool {
        let ticker = self.ticker.trim().to_uppercase();
        ticker.chars().count() > 7
            || ticker.contains(' ')
            || self.preco_atual.is_nan()
            || self.preco_atual <= 0.0
            || (self.tipo == "Renda Fixa" && !ticker.chars().any(|c| c.is_ascii_digit()))
    }
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Resumo {
    #[serde(rename = "Total")]
    pub total: f64,
    #[serde(rename = "RendaMensal")]
    pub renda_mensal: f64,
    #[serde(rename = "TotalInvestido")]
    pub total_investido: f64,
    #[serde(rename = "LucroTotal")]
    pub lucro_total: f64,
    /// Per-category totals the backend adds dynamically.
    #[serde(flatten)]
    pub categorias: BTreeMap<String, f64>,
}
impl Resumo {
    /// Average yearly yield on cost in percent.
    pub fn yield_on_cost(&self) -> f64 {
        if self.total_investido > 0.0 {
            self.renda_mensal * 12.0 / self.total_investido * 100.0
        } else {
            0.0
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Slice {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DashboardData {
    pub status: String,
    pub dolar: f64,
    pub resumo: Resumo,
    pub grafico: Vec<Slice>,
    pub alertas: Vec<String>,
    pub ativos: Vec<Asset>,
    pub detalhe: Option<String>,
    pub msg: Option<String>,
}
impl DashboardData {
    pub fn is_error(&self) -> bool {
        self.status == "Erro"
    }

    pub fn error_message(&self) -> String {
        self.detalhe
            .clone()
            .or_else(|| self.msg.clone())
            .unwrap_or_else(|| "erro desconhecido".to_string())
    }

    /// Assets of one category tab sorted by ticker; `None` selects all.
    pub fn assets_of(&self, category: Option<&str>) -> Vec<&Asset> {
        let mut assets = self
            .ativos
            .iter()
            .filter(|a| category.map_or(true, |c| a.tipo == c))
            .collect::<Vec<_>>();
        assets.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        assets
    }

    /// Best-scored assets with an open gap.
    pub fn top_picks(&self, n: usize) -> Vec<&Asset> {
        let mut picks = self
            .ativos
            .iter()
            .filter(|a| a.falta_comprar > 0.0)
            .collect::<Vec<_>>();
        picks.sort_by(|a, b| b.score.total_cmp(&a.score));
        picks.truncate(n);
        picks
    }

    /// Alerts reference assets by database id.
    pub fn asset_by_id(&self, id: i64) -> Option<&Asset> {
        self.ativos.iter().find(|a| a.id == id)
    }

    /// Dashboard rows carry no id, the ticker is their key.
    pub fn asset_by_ticker(&self, ticker: &str) -> Option<&Asset> {
        self.ativos.iter().find(|a| a.ticker == ticker)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HistoryPoint {
    pub date: String,
    #[serde(rename = "Patrimônio")]
    pub patrimonio: f64,
    #[serde(rename = "Investido")]
    pub investido: f64,
}

/// An upcoming (calendar) or received (history) dividend.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Evento {
    pub ticker: String,
    pub date: String,
    pub total: f64,
    pub status: String,
    pub value_per_share: f64,
    pub is_estimate: bool,
    pub quantity: Option<f64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Alert {
    pub id: i64,
    pub ticker: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub field: String,
}
impl Alert {
    pub fn is_critical(&self) -> bool {
        self.kind.to_uppercase().starts_with("CR")
    }
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NewsItem {
    pub title: String,
    pub link: String,
    pub source: String,
    pub published: String,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CorrelationPoint {
    pub x: String,
    pub y: String,
    pub value: f64,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CorrelationData {
    pub status: String,
    pub labels: Vec<String>,
    pub matrix: Vec<CorrelationPoint>,
}
impl CorrelationData {
    pub fn is_success(&self) -> bool {
        self.status == "Sucesso"
    }

    pub fn is_sufficient(&self) -> bool {
        self.labels.len() >= 2
    }

    /// Row-major lookup table over `labels`; missing pairs are `None`.
    pub fn grid(&self) -> Vec<Vec<Option<f64>>> {
        let idx = |l: &str| self.labels.iter().position(|x| x == l);
        let n = self.labels.len();
        let mut grid = vec![vec![None; n]; n];
        for p in &self.matrix {
            if let (Some(i), Some(j)) = (idx(&p.x), idx(&p.y)) {
                grid[i][j] = Some(p.value);
            }
        }
        grid
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationBand {
    Diagonal,
    StrongPositive,
    Positive,
    WeakPositive,
    Neutral,
    WeakNegative,
    Negative,
    StrongNegative,
}
impl CorrelationBand {
    pub fn of(value: f64, is_diagonal: bool) -> Self {
        if is_diagonal {
            CorrelationBand::Diagonal
        } else if value >= 0.7 {
            CorrelationBand::StrongPositive
        } else if value >= 0.4 {
            CorrelationBand::Positive
        } else if value >= 0.1 {
            CorrelationBand::WeakPositive
        } else if value > -0.1 {
            CorrelationBand::Neutral
        } else if value > -0.4 {
            CorrelationBand::WeakNegative
        } else if value > -0.7 {
            CorrelationBand::Negative
        } else {
            CorrelationBand::StrongNegative
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Projection {
    pub pior_caso: Vec<f64>,
    pub medio: Vec<f64>,
    pub melhor_caso: Vec<f64>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MonteCarloData {
    pub status: String,
    pub volatilidade_anual: serde_json::Value,
    pub projecao: Projection,
}
impl MonteCarloData {
    pub fn is_success(&self) -> bool {
        self.status == "Sucesso" && !self.projecao.medio.is_empty()
    }

    pub fn volatility_label(&self) -> String {
        match &self.volatilidade_anual {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            _ => "-".to_string(),
        }
    }
}

/// Category the risk radar assigns to a backend alert string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadarKind {
    Opportunity,
    Adjustment,
    HighRisk,
    Support,
    Movement,
}
impl RadarKind {
    pub fn classify(text: &str) -> Self {
        let t = text.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| t.contains(w));
        if has(&["oportunidade", "graham", "desconto"]) {
            RadarKind::Opportunity
        } else if has(&["rebalancear", "meta"]) {
            RadarKind::Adjustment
        } else if has(&["esticado", "rsi alto", "alerta"]) {
            RadarKind::HighRisk
        } else if has(&["mínima", "fundo"]) {
            RadarKind::Support
        } else {
            RadarKind::Movement
        }
    }
}
impl Display for RadarKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RadarKind::Opportunity => f.write_str("Oportunidade"),
            RadarKind::Adjustment => f.write_str("Ajuste"),
            RadarKind::HighRisk => f.write_str("Risco Elevado"),
            RadarKind::Support => f.write_str("Suporte"),
            RadarKind::Movement => f.write_str("Movimentação"),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CategoryRow {
    pub tipo: String,
    pub investido: f64,
    pub atual: f64,
    pub pct_investido: f64,
    pub pct_atual: f64,
    pub meta: f64,
}
impl CategoryRow {
    /// Deviation of the current share from the macro target in percentage points.
    pub fn deviation(&self) -> f64 {
        self.pct_atual - self.meta
    }
}

/// Consolidation per category sorted by current value, largest first.
pub fn category_summary(assets: &[Asset]) -> Vec<CategoryRow> {
    let mut groups: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for a in assets {
        let entry = groups.entry(a.tipo.as_str()).or_default();
        entry.0 += a.total_investido;
        entry.1 += a.total_atual;
    }
    let total_investido: f64 = groups.values().map(|(i, _)| i).sum();
    let total_atual: f64 = groups.values().map(|(_, c)| c).sum();
    let pct = |x: f64, total: f64| if total > 0.0 { x / total * 100.0 } else { 0.0 };
    let mut rows = groups
        .into_iter()
        .map(|(tipo, (investido, atual))| CategoryRow {
            tipo: tipo.to_string(),
            investido,
            atual,
            pct_investido: pct(investido, total_investido),
            pct_atual: pct(atual, total_atual),
            meta: category_target(tipo),
        })
        .collect::<Vec<_>>();
    rows.sort_by(|a, b| b.atual.total_cmp(&a.atual));
    rows
}

/// Highest target percentage an asset may take without its category exceeding 100%.
pub fn max_target_for(asset: &Asset, all: &[Asset]) -> f64 {
    let taken: f64 = all
        .iter()
        .filter(|a| a.tipo == asset.tipo && a.ticker != asset.ticker)
        .map(|a| a.meta)
        .sum();
    (100.0 - taken).max(0.0)
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct NewAsset {
    pub ticker: String,
    pub category: String,
    pub qtd: f64,
    pub pm: f64,
    pub meta: f64,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct AssetUpdate {
    pub ticker: String,
    pub qtd: f64,
    pub pm: f64,
    pub meta: f64,
    pub dy: f64,
    pub lpa: f64,
    pub vpa: f64,
    pub manual_price: f64,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct AssetDelete {
    pub id: i64,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WriteReply {
    pub status: String,
    pub msg: String,
}
impl WriteReply {
    pub fn is_success(&self) -> bool {
        self.status == "Sucesso"
    }
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoginReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
fn asset(ticker: &str, tipo: &str) -> Asset {
    Asset {
        ticker: ticker.to_string(),
        tipo: tipo.to_string(),
        preco_atual: 10.0,
        ..Default::default()
    }
}

#[test]
fn test_dashboard_from_json() {
    let json = r#"{
        "status": "Sucesso",
        "dolar": 5.1,
        "resumo": {"Total": 1000.0, "RendaMensal": 10.0, "TotalInvestido": 800.0,
                   "LucroTotal": 200.0, "FII": 400.0},
        "grafico": [{"name": "FII", "value": 400.0}],
        "alertas": ["PETR4 esticado"],
        "ativos": [{"id": 3, "ticker": "MXRF11", "tipo": "FII", "qtd": 10, "status": "COMPRAR",
                    "score": 55, "vi_graham": null, "falta_comprar": 120.5}]
    }"#;
    let data: DashboardData = serde_json::from_str(json).unwrap();
    assert!(!data.is_error());
    assert_eq!(data.resumo.total, 1000.0);
    assert_eq!(data.resumo.categorias.get("FII"), Some(&400.0));
    assert!((data.resumo.yield_on_cost() - 15.0).abs() < 1e-12);
    let a = &data.ativos[0];
    assert_eq!(a.status, AssetStatus::Comprar);
    assert_eq!(a.vi_graham, None);
    assert_eq!(a.qtd, 10.0);
    assert_eq!(data.asset_by_id(3).map(|a| a.ticker.as_str()), Some("MXRF11"));
}

#[test]
fn test_dashboard_error_and_unknown_status() {
    let data: DashboardData =
        serde_json::from_str(r#"{"status": "Erro", "detalhe": "db locked"}"#).unwrap();
    assert!(data.is_error());
    assert_eq!(data.error_message(), "db locked");
    let a: Asset = serde_json::from_str(r#"{"ticker": "X", "status": "VENDER"}"#).unwrap();
    assert_eq!(a.status, AssetStatus::Neutro);
    assert!(!a.status.has_badge());
}

#[test]
fn test_assets_of_and_top_picks() {
    let mut b = asset("BBAS3", "Ação");
    b.falta_comprar = 100.0;
    b.score = 30.0;
    let mut a = asset("ABEV3", "Ação");
    a.falta_comprar = 50.0;
    a.score = 80.0;
    let f = asset("HGLG11", "FII");
    let data = DashboardData {
        ativos: vec![b, a, f],
        ..Default::default()
    };
    let acoes = data.assets_of(Some("Ação"));
    assert_eq!(
        acoes.iter().map(|a| a.ticker.as_str()).collect::<Vec<_>>(),
        vec!["ABEV3", "BBAS3"]
    );
    assert_eq!(data.assets_of(None).len(), 3);
    let picks = data.top_picks(3);
    assert_eq!(picks.len(), 2);
    assert_eq!(picks[0].ticker, "ABEV3");
}

#[test]
fn test_category_summary() {
    let mut a = asset("ABEV3", "Ação");
    a.total_investido = 100.0;
    a.total_atual = 150.0;
    let mut b = asset("HGLG11", "FII");
    b.total_investido = 300.0;
    b.total_atual = 350.0;
    let rows = category_summary(&[a, b]);
    assert_eq!(rows[0].tipo, "FII");
    assert!((rows[0].pct_atual - 70.0).abs() < 1e-12);
    assert!((rows[0].pct_investido - 75.0).abs() < 1e-12);
    assert!((rows[0].deviation() - 35.0).abs() < 1e-12);
    assert_eq!(rows[1].meta, 25.0);
    assert!(category_summary(&[]).is_empty());
}

#[test]
fn test_max_target_and_manual_price() {
    let mut a = asset("ABEV3", "Ação");
    a.meta = 30.0;
    let mut b = asset("BBAS3", "Ação");
    b.meta = 50.0;
    let mut f = asset("HGLG11", "FII");
    f.meta = 90.0;
    let all = vec![a.clone(), b, f];
    assert_eq!(max_target_for(&a, &all), 50.0);

    assert!(!a.needs_manual_price());
    assert!(asset("TESOURO SELIC", "Renda Fixa").needs_manual_price());
    assert!(asset("CDBX", "Renda Fixa").needs_manual_price());
    assert!(!asset("LCI2027", "Renda Fixa").needs_manual_price());
    let mut z = asset("ABEV3", "Ação");
    z.preco_atual = 0.0;
    assert!(z.needs_manual_price());
}

#[test]
fn test_radar_and_correlation_bands() {
    assert_eq!(RadarKind::classify("Desconto Graham em BBAS3"), RadarKind::Opportunity);
    assert_eq!(RadarKind::classify("Rebalancear FII"), RadarKind::Adjustment);
    assert_eq!(RadarKind::classify("PETR4 RSI alto"), RadarKind::HighRisk);
    assert_eq!(RadarKind::classify("Perto da mínima de 6m"), RadarKind::Support);
    assert_eq!(RadarKind::classify("nada"), RadarKind::Movement);

    assert_eq!(CorrelationBand::of(0.2, true), CorrelationBand::Diagonal);
    assert_eq!(CorrelationBand::of(0.7, false), CorrelationBand::StrongPositive);
    assert_eq!(CorrelationBand::of(0.0, false), CorrelationBand::Neutral);
    assert_eq!(CorrelationBand::of(-0.1, false), CorrelationBand::WeakNegative);
    assert_eq!(CorrelationBand::of(-0.7, false), CorrelationBand::StrongNegative);
}

#[test]
fn test_correlation_grid() {
    let json = r#"{"status": "Sucesso", "labels": ["A", "B"],
        "matrix": [{"x": "A", "y": "B", "value": 0.5}, {"x": "B", "y": "A", "value": 0.5},
                   {"x": "C", "y": "A", "value": 0.1}]}"#;
    let c: CorrelationData = serde_json::from_str(json).unwrap();
    assert!(c.is_success() && c.is_sufficient());
    let g = c.grid();
    assert_eq!(g[0][1], Some(0.5));
    assert_eq!(g[0][0], None);
}

#[test]
fn test_monte_carlo_from_json() {
    let json = r#"{"status": "Sucesso", "volatilidade_anual": "18.2%",
        "projecao": {"pior_caso": [1.0, 0.9], "medio": [1.0, 1.1], "melhor_caso": [1.0, 1.3]}}"#;
    let m: MonteCarloData = serde_json::from_str(json).unwrap();
    assert!(m.is_success());
    assert_eq!(m.volatility_label(), "18.2%");
    let m: MonteCarloData = serde_json::from_str(r#"{"status": "Erro"}"#).unwrap();
    assert!(!m.is_success());
}
