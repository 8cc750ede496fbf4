//! Catalog of the upstream services and how each one is harvested.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::extract::{LevelOrder, ResourceSpec, TaxonomyLevel};
use crate::fetch::{Endpoint, Keys};
use crate::normalize::NormalizerConfig;
use crate::table::DelimitedFormat;

pub const FUEL_ECONOMY_URL: &str = "https://fueleconomy.gov/ws/rest/vehicle";
pub const FUEL_ECONOMY_MPG_URL: &str = "https://www.fueleconomy.gov/ws/rest/ympg/shared";
pub const NHTSA_URL: &str = "https://api.nhtsa.gov";
pub const NREL_URL: &str = "https://developer.nrel.gov";

/// Environment variable holding the NREL API key.
pub const NREL_API_KEY_VAR: &str = "NREL_API_KEY";

/// Which upstream service to harvest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    FuelEconomy,
    SafetyRatings,
    Recalls,
    Stations,
}

impl SourceId {
    pub const ALL: [SourceId; 4] = [
        SourceId::FuelEconomy,
        SourceId::SafetyRatings,
        SourceId::Recalls,
        SourceId::Stations,
    ];

    /// Name of the primary dataset the source produces.
    pub fn dataset(&self) -> &'static str {
        match self {
            SourceId::FuelEconomy => "fuel",
            SourceId::SafetyRatings => "ratings",
            SourceId::Recalls => "recalls",
            SourceId::Stations => "stations",
        }
    }

    /// Delimited layout of the source's files: pipe for stations, comma
    /// for the taxonomy sources.
    pub fn format(&self) -> DelimitedFormat {
        match self {
            SourceId::Stations => DelimitedFormat::pipe(),
            _ => DelimitedFormat::comma(),
        }
    }

    /// Normalization settings of the source's datasets.
    pub fn normalizer(&self) -> NormalizerConfig {
        let config = NormalizerConfig::default();
        match self {
            SourceId::FuelEconomy => config
                .with_id_column("vehicle_id")
                .with_unwrap("emissionsList", "emissionsInfo"),
            SourceId::SafetyRatings => config.with_id_column("VehicleId"),
            SourceId::Recalls => config.with_id_column("NHTSACampaignNumber"),
            SourceId::Stations => config
                .with_id_column("id")
                .with_first_columns(STATION_FIRST_COLUMNS.iter().copied()),
        }
    }
}

/// Leading columns of the stations table.
pub const STATION_FIRST_COLUMNS: &[&str] = &[
    "id",
    "station_name",
    "fuel_type_code",
    "owner_type_code",
    "country",
    "state",
    "city",
    "street_address",
    "zip",
    "open_date",
    "updated_at",
];

/// A source harvested by walking a taxonomy down to entity ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomySource {
    pub id: SourceId,
    pub levels: Vec<TaxonomyLevel>,
    pub primary: ResourceSpec,
    #[serde(default)]
    pub secondaries: Vec<ResourceSpec>,
    /// Copy the ancestor keys (year, make, ...) into the primary table.
    #[serde(default)]
    pub reference_keys: bool,
    pub normalizer: NormalizerConfig,
}

/// A source harvested page by page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedSource {
    pub id: SourceId,
    pub endpoint: Endpoint,
    pub results_key: String,
    pub page_size: usize,
    #[serde(skip)]
    pub keys: Keys,
    pub normalizer: NormalizerConfig,
}

/// A harvestable source.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Taxonomy(TaxonomySource),
    Paginated(PaginatedSource),
}

impl Source {
    pub fn id(&self) -> SourceId {
        match self {
            Source::Taxonomy(s) => s.id,
            Source::Paginated(s) => s.id,
        }
    }

    pub fn normalizer(&self) -> &NormalizerConfig {
        match self {
            Source::Taxonomy(s) => &s.normalizer,
            Source::Paginated(s) => &s.normalizer,
        }
    }
}

/// Breadth limits for the taxonomy sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxonomyLimits {
    /// Most recent years explored; `None` explores every year.
    pub num_years: Option<usize>,
    /// Makes explored per year.
    pub makes_per_year: Option<usize>,
    /// Year values never explored.
    pub excluded_years: Vec<String>,
}

impl Default for TaxonomyLimits {
    fn default() -> Self {
        Self {
            num_years: Some(1),
            makes_per_year: None,
            excluded_years: vec!["9999".to_string()],
        }
    }
}

fn json_endpoint(base: &str, path: &str) -> Endpoint {
    Endpoint::new(base, path).with_header("Accept", "application/json")
}

/// fueleconomy.gov: year → make → model → vehicle id menus, vehicle detail,
/// and the two "your MPG" resources.
pub fn fuel_economy(limits: &TaxonomyLimits) -> TaxonomySource {
    let menu = |path: &str| json_endpoint(FUEL_ECONOMY_URL, path);

    let mut year = TaxonomyLevel::menu("year", menu("/menu/year"))
        .with_order(LevelOrder::Descending)
        .with_limit(limits.num_years);
    year.exclude = limits.excluded_years.clone();

    TaxonomySource {
        id: SourceId::FuelEconomy,
        levels: vec![
            year,
            TaxonomyLevel::menu("make", menu("/menu/make").with_query("year", "{year}"))
                .with_limit(limits.makes_per_year),
            TaxonomyLevel::menu(
                "model",
                menu("/menu/model")
                    .with_query("year", "{year}")
                    .with_query("make", "{make}"),
            ),
            TaxonomyLevel::menu(
                "vehicle_id",
                menu("/menu/options")
                    .with_query("year", "{year}")
                    .with_query("make", "{make}")
                    .with_query("model", "{model}"),
            ),
        ],
        primary: ResourceSpec::new("fuel", menu("/{vehicle_id}")),
        secondaries: vec![
            ResourceSpec::new(
                "mpg_summary",
                json_endpoint(FUEL_ECONOMY_MPG_URL, "/ympgVehicle/{vehicle_id}"),
            ),
            ResourceSpec::new(
                "mpg_detail",
                json_endpoint(FUEL_ECONOMY_MPG_URL, "/ympgDriverVehicle/{vehicle_id}"),
            )
            .with_unwrap("yourMpgDriverVehicle"),
        ],
        reference_keys: false,
        normalizer: SourceId::FuelEconomy.normalizer(),
    }
}

/// NHTSA 5-star safety ratings: model year → make → model → vehicle id.
pub fn safety_ratings(limits: &TaxonomyLimits) -> TaxonomySource {
    let api = |path: &str| json_endpoint(NHTSA_URL, path);

    let mut year = TaxonomyLevel::results("ModelYear", api("/SafetyRatings"), "Results", "ModelYear")
        .with_order(LevelOrder::Descending)
        .with_limit(limits.num_years);
    year.exclude = limits.excluded_years.clone();

    TaxonomySource {
        id: SourceId::SafetyRatings,
        levels: vec![
            year,
            TaxonomyLevel::results(
                "Make",
                api("/SafetyRatings/modelyear/{ModelYear}"),
                "Results",
                "Make",
            )
            .with_limit(limits.makes_per_year),
            TaxonomyLevel::results(
                "Model",
                api("/SafetyRatings/modelyear/{ModelYear}/make/{Make}"),
                "Results",
                "Model",
            ),
            TaxonomyLevel::results(
                "VehicleId",
                api("/SafetyRatings/modelyear/{ModelYear}/make/{Make}/model/{Model}"),
                "Results",
                "VehicleId",
            )
            .with_label("VehicleDescription"),
        ],
        primary: ResourceSpec::new("ratings", api("/SafetyRatings/VehicleId/{VehicleId}"))
            .with_unwrap("Results"),
        secondaries: Vec::new(),
        reference_keys: false,
        normalizer: SourceId::SafetyRatings.normalizer(),
    }
}

/// NHTSA recalls: model year → make → model, then recalls per model.
pub fn recalls(limits: &TaxonomyLimits) -> TaxonomySource {
    let api = |path: &str| json_endpoint(NHTSA_URL, path).with_query("issueType", "r");

    let mut year = TaxonomyLevel::results(
        "modelYear",
        api("/products/vehicle/modelYears"),
        "results",
        "modelYear",
    )
    .with_order(LevelOrder::Descending)
    .with_limit(limits.num_years);
    year.exclude = limits.excluded_years.clone();

    TaxonomySource {
        id: SourceId::Recalls,
        levels: vec![
            year,
            TaxonomyLevel::results(
                "make",
                api("/products/vehicle/makes").with_query("modelYear", "{modelYear}"),
                "results",
                "make",
            )
            .with_limit(limits.makes_per_year),
            TaxonomyLevel::results(
                "model",
                api("/products/vehicle/models")
                    .with_query("modelYear", "{modelYear}")
                    .with_query("make", "{make}"),
                "results",
                "model",
            ),
        ],
        primary: ResourceSpec::new(
            "recalls",
            json_endpoint(NHTSA_URL, "/recalls/recallsByVehicle")
                .with_query("make", "{make}")
                .with_query("model", "{model}")
                .with_query("modelYear", "{modelYear}"),
        )
        .with_unwrap("results"),
        secondaries: Vec::new(),
        reference_keys: true,
        normalizer: SourceId::Recalls.normalizer(),
    }
}

/// Default station filters sent with every NREL page request.
pub fn default_station_filters() -> IndexMap<String, String> {
    [
        ("fuel_type", "ELEC,HY,LNG"),
        ("status", "E"),
        ("access", "public"),
        ("country", "US"),
        ("maximum_vehicle_class", "LD"),
        ("cards_accepted", "CREDIT,V"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// NREL alternative fuel stations, paged by offset.
pub fn stations(api_key: &str, page_size: usize, filters: &IndexMap<String, String>) -> PaginatedSource {
    let mut endpoint = json_endpoint(NREL_URL, "/api/alt-fuel-stations/v1.json")
        .with_query("api_key", "{api_key}");
    for (name, value) in filters {
        endpoint = endpoint.with_query(name.as_str(), value.as_str());
    }

    let mut keys = Keys::new();
    keys.insert("api_key".to_string(), api_key.to_string());

    PaginatedSource {
        id: SourceId::Stations,
        endpoint,
        results_key: "fuel_stations".to_string(),
        page_size,
        keys,
        normalizer: SourceId::Stations.normalizer(),
    }
}
