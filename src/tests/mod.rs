mod notifications;
mod register;
mod sharing;
