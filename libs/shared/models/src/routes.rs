//! Client-side navigation targets referenced by redirects.

pub const LOGIN: &str = "/";
pub const SIGNUP: &str = "/signup";
pub const PATIENT_LOGIN: &str = "/PatientLogin";
pub const PATIENT_SIGNUP: &str = "/PatientSignUp";
pub const PATIENT_DASHBOARD: &str = "/patient-dashboard";
pub const DENTIST_DASHBOARD: &str = "/dentist-dashboard";
pub const DENTIST_CONSULTATIONS: &str = "/dentist-dashboard/consultations";
pub const DENTIST_CALENDAR: &str = "/dentist-dashboard/calendar";
pub const DENTIST_PROFILE: &str = "/dentist-dashboard/profile";
