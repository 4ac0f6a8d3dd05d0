mod config;
mod reporting;
mod scheduling;
mod startup;
