// Library root for the headless companion: the event loop lives here so it
// can be tested without the binary's startup sequence.

pub mod app;
