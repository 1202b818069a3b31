use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, Sender};

use egui::Context;

use crate::{
    aflerr,
    allocation::parse_currency,
    core_types::{to_afl, AflResult},
    model::{max_target_for, Asset, AssetUpdate, LoginRequest, NewAsset, CATEGORIES},
};

#[derive(Debug, Default, Clone)]
pub enum RestRequestState<'a> {
    #[default]
    None,
    InProgress(&'a str),
    Done((&'a str, ehttp::Result<ehttp::Response>)),
}

pub enum RestMethod {
    Get,
    /// JSON body
    Post(Vec<u8>),
}
impl RestMethod {
    pub fn json<T: Serialize>(payload: &T) -> AflResult<Self> {
        serde_json::to_vec(payload)
            .map(RestMethod::Post)
            .map_err(to_afl)
    }
}

pub struct RestRequest<'a> {
    pub state: RestRequestState<'a>,
    tx: Sender<ehttp::Result<ehttp::Response>>,
    rx: Receiver<ehttp::Result<ehttp::Response>>,
}
impl<'a> RestRequest<'a> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            state: RestRequestState::None,
            tx,
            rx,
        }
    }
    pub fn is_in_progress(&self) -> bool {
        matches!(self.state, RestRequestState::InProgress(_))
    }
    pub fn check(&self) -> RestRequestState<'a> {
        if let RestRequestState::InProgress(s) = self.state {
            match self.rx.try_recv() {
                Ok(d) => RestRequestState::Done((s, d)),
                _ => self.state.clone(),
            }
        } else {
            self.state.clone()
        }
    }
    /// Hands out a finished response once and resets the request.
    pub fn poll(&mut self) -> Option<ehttp::Result<ehttp::Response>> {
        match self.check() {
            RestRequestState::Done((_, d)) => {
                self.state = RestRequestState::None;
                Some(d)
            }
            state => {
                self.state = state;
                None
            }
        }
    }
    pub fn trigger(
        &mut self,
        url: &str,
        name: &'a str,
        method: RestMethod,
        session: Option<&str>,
        ctx: Option<Context>,
    ) {
        let mut req = match method {
            RestMethod::Get => ehttp::Request::get(url),
            RestMethod::Post(body) => {
                let mut req = ehttp::Request::post(url, body);
                req.headers.insert("Content-Type", "application/json");
                req
            }
        };
        req.headers.insert("Accept", "application/json");
        // browsers attach the cookie themselves and forbid setting it
        #[cfg(not(target_arch = "wasm32"))]
        {
            if let Some(cookie) = session {
                req.headers.insert("Cookie", cookie);
            }
        }
        #[cfg(target_arch = "wasm32")]
        let _ = session;
        tracing::debug!(name, url, "request");
        let tx = self.tx.clone();
        ehttp::fetch(req, move |response| {
            if let Err(e) = tx.send(response) {
                tracing::warn!("response dropped: {e}");
            }
            if let Some(ctx) = ctx {
                ctx.request_repaint();
            }
        });
        self.state = RestRequestState::InProgress(name);
    }
}
impl Default for RestRequest<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Accepts `1.234,5` as well as `1234.5`; blank input is 0.
pub fn parse_decimal(s: &str, field: &str) -> AflResult<f64> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(0.0);
    }
    let normalized = if s.contains(',') {
        s.replace('.', "").replace(',', ".")
    } else {
        s.to_string()
    };
    let x: f64 = normalized
        .parse()
        .map_err(|_| aflerr!("{field}: '{s}' não é um número"))?;
    if x.is_finite() {
        Ok(x)
    } else {
        Err(aflerr!("{field}: '{s}' não é um número"))
    }
}

fn fmt_field(x: f64) -> String {
    if x == 0.0 {
        String::new()
    } else {
        format!("{x}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddAssetForm {
    pub ticker: String,
    pub category: String,
    pub qtd: String,
    pub pm: String,
    pub meta: String,
}
impl AddAssetForm {
    pub fn parse(&self) -> AflResult<NewAsset> {
        let ticker = self.ticker.trim().to_uppercase();
        let qtd = parse_decimal(&self.qtd, "Quantidade")?;
        let pm = parse_decimal(&self.pm, "Preço médio")?;
        if ticker.is_empty() || qtd <= 0.0 || pm <= 0.0 {
            return Err(aflerr!(
                "Preencha todos os campos corretamente (Ticker, Qtd e Preço)."
            ));
        }
        Ok(NewAsset {
            ticker,
            category: self.category.clone(),
            qtd,
            pm,
            meta: parse_decimal(&self.meta, "Meta")?.max(0.0),
        })
    }
}
impl Default for AddAssetForm {
    fn default() -> Self {
        AddAssetForm {
            ticker: String::new(),
            category: CATEGORIES[0].to_string(),
            qtd: String::new(),
            pm: String::new(),
            meta: String::new(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct EditAssetForm {
    pub id: i64,
    pub ticker: String,
    pub tipo: String,
    pub qtd: String,
    pub pm: String,
    pub meta: f64,
    pub max_meta: f64,
    /// percent, the backend stores a fraction
    pub dy: String,
    pub lpa: String,
    pub vpa: String,
    pub manual_price: String,
    pub needs_manual_price: bool,
}
impl EditAssetForm {
    pub fn from_asset(asset: &Asset, all: &[Asset]) -> Self {
        let max_meta = max_target_for(asset, all);
        EditAssetForm {
            id: asset.id,
            ticker: asset.ticker.clone(),
            tipo: asset.tipo.clone(),
            qtd: fmt_field(asset.qtd),
            pm: fmt_field(asset.pm),
            meta: asset.meta.clamp(0.0, max_meta),
            max_meta,
            dy: fmt_field((asset.manual_dy.unwrap_or(0.0) * 10000.0).round() / 100.0),
            lpa: fmt_field(asset.manual_lpa.unwrap_or(0.0)),
            vpa: fmt_field(asset.manual_vpa.unwrap_or(0.0)),
            manual_price: if asset.preco_atual.is_finite() {
                fmt_field(asset.preco_atual)
            } else {
                String::new()
            },
            needs_manual_price: asset.needs_manual_price(),
        }
    }
    pub fn parse(&self) -> AflResult<AssetUpdate> {
        let non_negative = |s: &str, field: &str| parse_decimal(s, field).map(|x| x.max(0.0));
        Ok(AssetUpdate {
            ticker: self.ticker.clone(),
            qtd: non_negative(&self.qtd, "Quantidade")?,
            pm: non_negative(&self.pm, "Preço médio")?,
            meta: self.meta.clamp(0.0, self.max_meta),
            dy: non_negative(&self.dy, "DY")? / 100.0,
            lpa: parse_decimal(&self.lpa, "LPA")?,
            vpa: parse_decimal(&self.vpa, "VPA")?,
            manual_price: if self.needs_manual_price {
                non_negative(&self.manual_price, "Preço manual")?
            } else {
                0.0
            },
        })
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct LoginForm {
    pub password: String,
    pub error: Option<String>,
}
impl LoginForm {
    pub fn request(&self) -> LoginRequest {
        LoginRequest {
            password: self.password.clone(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorInput {
    pub amount: String,
}
impl SimulatorInput {
    pub fn parse(&self) -> AflResult<f64> {
        let amount = parse_currency(&self.amount);
        if amount > 0.0 {
            Ok(amount)
        } else {
            Err(aflerr!("Informe um valor de aporte maior que zero"))
        }
    }
}

#[cfg(test)]
fn fixed_income(ticker: &str, meta: f64) -> Asset {
    Asset {
        id: 3,
        ticker: ticker.to_string(),
        tipo: "Renda Fixa".to_string(),
        qtd: 1.0,
        pm: 1000.0,
        meta,
        preco_atual: 0.0,
        manual_dy: Some(0.1234),
        ..Default::default()
    }
}

#[test]
fn test_parse_decimal() {
    assert_eq!(parse_decimal("", "x").unwrap(), 0.0);
    assert_eq!(parse_decimal("12.5", "x").unwrap(), 12.5);
    assert_eq!(parse_decimal("1.234,5", "x").unwrap(), 1234.5);
    assert_eq!(parse_decimal(" 7 ", "x").unwrap(), 7.0);
    let e = parse_decimal("abc", "Quantidade").unwrap_err();
    assert!(e.msg.starts_with("Quantidade"));
    assert!(parse_decimal("inf", "x").is_err());
}

#[test]
fn test_add_asset_form() {
    let mut form = AddAssetForm {
        ticker: " petr4 ".to_string(),
        qtd: "10".to_string(),
        pm: "32,50".to_string(),
        ..Default::default()
    };
    let new = form.parse().unwrap();
    assert_eq!(new.ticker, "PETR4");
    assert_eq!(new.category, "Ação");
    assert_eq!(new.pm, 32.5);
    assert_eq!(new.meta, 0.0);

    form.qtd = "0".to_string();
    assert!(form.parse().is_err());
    form.qtd = "1".to_string();
    form.ticker = "  ".to_string();
    assert!(form.parse().is_err());
    form.ticker = "X".to_string();
    form.pm = "-3".to_string();
    assert!(form.parse().is_err());
}

#[test]
fn test_edit_asset_form() {
    let other = fixed_income("TESOURO IPCA", 70.0);
    let mut cdb = fixed_income("CDB BANCO", 50.0);
    cdb.id = 4;
    let all = vec![other, cdb.clone()];
    let mut form = EditAssetForm::from_asset(&cdb, &all);
    assert_eq!(form.max_meta, 30.0);
    assert_eq!(form.meta, 30.0);
    assert_eq!(form.dy, "12.34");
    assert!(form.needs_manual_price);

    form.manual_price = "1050,75".to_string();
    form.meta = 45.0;
    let update = form.parse().unwrap();
    assert_eq!(update.meta, 30.0);
    assert!((update.dy - 0.1234).abs() < 1e-12);
    assert_eq!(update.manual_price, 1050.75);

    let mut stock = Asset {
        ticker: "WEGE3".to_string(),
        tipo: "Ação".to_string(),
        preco_atual: 40.0,
        ..Default::default()
    };
    stock.meta = 10.0;
    let form = EditAssetForm::from_asset(&stock, &[stock.clone()]);
    assert!(!form.needs_manual_price);
    assert_eq!(form.max_meta, 100.0);
    assert_eq!(form.parse().unwrap().manual_price, 0.0);
}

#[test]
fn test_simulator_input() {
    let input = SimulatorInput {
        amount: "R$ 10.000,00".to_string(),
    };
    assert_eq!(input.parse().unwrap(), 10000.0);
    let input = SimulatorInput {
        amount: "abc".to_string(),
    };
    assert!(input.parse().is_err());
}
