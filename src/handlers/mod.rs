// Handler modules, one directory per resource.
//
// Everything under /api requires a JWT; the auth middleware injects the
// caller's identity before any handler here runs.
pub mod todos;
