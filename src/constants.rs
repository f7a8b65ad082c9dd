//! Column and configuration constants shared by every pipeline stage.

/// Base URL of the World Bank indicator API (v2).
pub const DEFAULT_API_BASE_URL: &str = "https://api.worldbank.org/v2";

/// Default location of the cleaned CSV artifact
pub const DEFAULT_CSV_PATH: &str = "worldbank_health_economy_clean.csv";

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Default destination table for the loader
pub const DEFAULT_TABLE: &str = "health_economy";

/// Environment variable holding the destination database path
pub const DB_PATH_ENV: &str = "WORLDBANK_DB_PATH";

// Key columns
pub const COUNTRY_CODE_COLUMN: &str = "country_code";
pub const YEAR_COLUMN: &str = "year";
pub const DATE_YEAR_COLUMN: &str = "date_year";

// Fields read from each API observation
pub const OBS_COUNTRY_FIELD: &str = "countryiso3code";
pub const OBS_DATE_FIELD: &str = "date";
pub const OBS_VALUE_FIELD: &str = "value";

/// Countries fetched when the config does not list any (code, display name)
pub const DEFAULT_COUNTRIES: &[(&str, &str)] = &[
    ("MEX", "Mexico"),
    ("CAN", "Canada"),
    ("USA", "United States of America"),
];

/// Indicators fetched when the config does not list any (API code, column name).
/// Order matters: the first indicator with data seeds each country's rows.
pub const DEFAULT_INDICATORS: &[(&str, &str)] = &[
    // Population (SP)
    ("SP.DYN.LE00.IN", "life_expectancy"),
    ("SP.DYN.IMRT.IN", "infant_mortality"),
    ("SP.DYN.CDRT.IN", "death_rate"),
    ("SP.DYN.TFRT.IN", "fertility_rate"),
    ("SP.POP.TOTL", "population_total"),
    // Health systems (SH)
    ("SH.XPD.CHEX.GD.ZS", "health_expenditure_pct_gdp"),
    ("SH.MED.BEDS.ZS", "hospital_beds_per_1000"),
    // Economy (NY)
    ("NY.GDP.MKTP.CD", "gdp_usd"),
    ("NY.GDP.PCAP.CD", "gdp_per_capita_usd"),
    ("NY.GDP.MKTP.KD.ZG", "gdp_growth_percent"),
    ("NY.GNP.PCAP.CD", "gnp_per_capita_usd"),
    ("NY.INC.PCAP.CD", "gni_per_capita_usd"),
    ("NY.EXP.GNFS.ZS", "exports_percent_gdp"),
    ("NY.IMP.GNFS.ZS", "imports_percent_gdp"),
    ("FP.CPI.TOTL.ZG", "inflation_percent"),
    ("SL.UEM.TOTL.ZS", "unemployment_percent"),
    // Education (SE)
    ("SE.ADT.LITR.ZS", "literacy_rate"),
    ("SE.XPD.TOTL.GD.ZS", "education_expenditure_pct_gdp"),
    // Social inclusion / poverty (SI)
    ("SP.POP.GROW", "population_growth_percent"),
    ("SI.POV.DDAY", "poverty_headcount_1_90"),
    ("SI.DST.04TH.20", "income_share_top_20"),
    // Environment (EN)
    ("EN.CLC.MDAT.ZS", "climate_disaster_impact_percent"),
];

/// Column list of the historical `Health_economy` table. It omits
/// `gni_per_capita_usd`, `exports_percent_gdp` and `imports_percent_gdp`.
pub const LEGACY_HEALTH_ECONOMY_COLUMNS: &[&str] = &[
    "country_code",
    "date_year",
    "life_expectancy",
    "infant_mortality",
    "death_rate",
    "fertility_rate",
    "population_total",
    "health_expenditure_pct_gdp",
    "hospital_beds_per_1000",
    "gdp_usd",
    "gdp_per_capita_usd",
    "gdp_growth_percent",
    "gnp_per_capita_usd",
    "inflation_percent",
    "unemployment_percent",
    "literacy_rate",
    "education_expenditure_pct_gdp",
    "population_growth_percent",
    "poverty_headcount_1_90",
    "income_share_top_20",
    "climate_disaster_impact_percent",
];
