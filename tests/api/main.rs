// all integration tests are bundled into a single binary, which links once
mod admin;
mod health_check;
mod helpers;
